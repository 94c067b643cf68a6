//! The tabular source format `initialize` loads from:
//! `(primary_category, subcategory, term, synonyms[])` rows.

#[derive(Debug, Clone)]
pub struct TaxonomySourceRow {
    pub primary_category: Option<String>,
    pub subcategory: Option<String>,
    pub term: String,
    pub synonyms: Vec<String>,
}

impl TaxonomySourceRow {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            primary_category: None,
            subcategory: None,
            term: term.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_category(mut self, primary: impl Into<String>, subcategory: impl Into<String>) -> Self {
        self.primary_category = Some(primary.into());
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_synonyms(mut self, synonyms: impl IntoIterator<Item = String>) -> Self {
        self.synonyms = synonyms.into_iter().collect();
        self
    }
}
