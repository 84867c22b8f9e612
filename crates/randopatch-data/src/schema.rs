//! On-disk shapes that differ from the core types they load into.
//!
//! Location, item, shop and additive-group descriptors deserialize straight
//! into the catalog types. Placements accept a compact tuple form as well.

use randopatch_core::settings::Placement;
use serde::Deserialize;

/// A placement entry, either `("Item", "Location")` or the full struct form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlacementData {
    Short(String, String),
    Full { item: String, location: String },
}

impl From<PlacementData> for Placement {
    fn from(data: PlacementData) -> Self {
        match data {
            PlacementData::Short(item, location) | PlacementData::Full { item, location } => {
                Placement { item, location }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_full_forms_agree() {
        let short: PlacementData = ron::from_str(r#"("Mask_Shard", "Boss_Geo-Gruz_Mother")"#).unwrap();
        let full: PlacementData =
            ron::from_str(r#"(item: "Mask_Shard", location: "Boss_Geo-Gruz_Mother")"#).unwrap();
        assert_eq!(Placement::from(short), Placement::from(full));
    }

    #[test]
    fn json_forms() {
        let list: Vec<PlacementData> = serde_json::from_str(
            r#"[["Grub", "Mask_Shard-Seer"], {"item": "Dream_Nail", "location": "Dream_Nail"}]"#,
        )
        .unwrap();
        let placements: Vec<Placement> = list.into_iter().map(Placement::from).collect();
        assert_eq!(placements[0], Placement::new("Grub", "Mask_Shard-Seer"));
        assert!(placements[1].is_vanilla());
    }
}
