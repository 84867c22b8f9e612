use slotmap::new_key_type;

new_key_type! {
    /// Identifies a state inside one FSM. Generation-checked, so a key held
    /// past `remove_state` never resolves to a different state.
    pub struct StateId;

    /// Identifies an object in a host scene.
    pub struct ObjectId;
}
