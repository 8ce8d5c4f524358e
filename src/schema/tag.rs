#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    text: String,
}

impl Tag {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }
}
