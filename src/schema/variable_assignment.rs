#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableAssignment {
    pub(crate) variable_name: String,
    pub(crate) is_new_declaration: bool,
    pub(crate) is_global: bool,
}

impl VariableAssignment {
    pub fn new<S: Into<String>>(variable_name: S, is_new_declaration: bool, is_global: bool) -> Self {
        Self {
            variable_name: variable_name.into(),
            is_new_declaration,
            is_global,
        }
    }
}
