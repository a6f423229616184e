/// Include/exclude lists applied to discovered identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl SourceFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: include.and_then(parse_list),
            exclude: exclude.and_then(parse_list),
        }
    }

    pub fn include(&self) -> Option<&[String]> {
        self.include.as_deref()
    }

    /// Keep identifiers named by `include` (all of them when unset), then drop
    /// those named by `exclude`. Discovery order is preserved and names in
    /// `include` that were not discovered are not invented.
    pub fn apply(&self, raw: Vec<String>) -> Vec<String> {
        raw.into_iter()
            .filter(|id| self.include.as_ref().map_or(true, |inc| inc.contains(id)))
            .filter(|id| self.exclude.as_ref().map_or(true, |exc| !exc.contains(id)))
            .collect()
    }
}

/// Comma separated, trimmed, empties dropped; `None` when nothing is left
pub fn parse_list(raw: &str) -> Option<Vec<String>> {
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
