/// Device string table.
///
/// Index 0 is the language-id descriptor and is never handed out; registered strings get
/// 1-based indices in registration order and are de-duplicated by value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringTable {
    strings: Vec<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, registering it if needed.
    pub fn get_id(&mut self, s: &str) -> u8 {
        if let Some(pos) = self.strings.iter().position(|existing| existing == s) {
            return (pos + 1) as u8;
        }
        if self.strings.len() >= usize::from(u8::MAX) {
            tracing::warn!(string = s, "string table full, reusing the last index");
            return u8::MAX;
        }
        self.strings.push(s.to_owned());
        self.strings.len() as u8
    }

    /// String for a non-zero descriptor index.
    ///
    /// Indices past the end of the table resolve to the first string, so a host probing
    /// arbitrary indices always gets an answer. An empty table has nothing to offer.
    pub fn get(&self, index: u8) -> Option<&str> {
        let idx = usize::from(index).checked_sub(1)?;
        self.strings
            .get(idx)
            .or_else(|| self.strings.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}
