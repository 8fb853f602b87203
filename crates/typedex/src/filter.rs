use std::fmt;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("filter expression item `{0}` must start with '+' or '-'")]
    MissingSign(String),
}

/// A regular expression that must match the whole input.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            FilterError::Pattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// Include/exclude string matcher, evaluated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Include(Pattern),
    Exclude(Pattern),
    Composite(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::accept_all()
    }
}

impl Filter {
    pub fn accept_all() -> Self {
        Filter::Composite(Vec::new())
    }

    pub fn include(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::Include(Pattern::new(pattern)?))
    }

    pub fn exclude(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::Exclude(Pattern::new(pattern)?))
    }

    /// Matches the package `name` and everything below it.
    pub fn include_package(name: &str) -> Result<Self, FilterError> {
        Filter::include(&package_prefix(name))
    }

    pub fn exclude_package(name: &str) -> Result<Self, FilterError> {
        Filter::exclude(&package_prefix(name))
    }

    /// Matches anything starting with the literal `prefix`.
    pub fn include_prefix(prefix: &str) -> Result<Self, FilterError> {
        Filter::include(&format!("{}.*", regex::escape(prefix)))
    }

    pub fn composite(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Composite(filters.into_iter().collect())
    }

    /// Appends `filter` to this chain, turning a single matcher into a
    /// composite when needed.
    pub fn and(self, filter: Filter) -> Self {
        match self {
            Filter::Composite(mut filters) => {
                filters.push(filter);
                Filter::Composite(filters)
            }
            single => Filter::Composite(vec![single, filter]),
        }
    }

    /// Parses `+regex,-regex,...` into a composite filter.
    pub fn parse(expression: &str) -> Result<Self, FilterError> {
        parse_items(expression, |pattern| pattern.to_string())
    }

    /// Parses `+package,-package,...`; each package also matches its children.
    pub fn parse_packages(expression: &str) -> Result<Self, FilterError> {
        parse_items(expression, package_prefix)
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Filter::Include(pattern) => pattern.full_match(value),
            Filter::Exclude(pattern) => !pattern.full_match(value),
            Filter::Composite(filters) => composite_accepts(filters, value),
        }
    }

    pub fn is_accept_all(&self) -> bool {
        matches!(self, Filter::Composite(filters) if filters.is_empty())
    }
}

fn composite_accepts(filters: &[Filter], value: &str) -> bool {
    let mut accept = filters.is_empty() || matches!(filters[0], Filter::Exclude(_));
    for filter in filters {
        let is_include = matches!(filter, Filter::Include(_));
        let is_exclude = matches!(filter, Filter::Exclude(_));
        if (accept && is_include) || (!accept && is_exclude) {
            continue;
        }
        accept = filter.accepts(value);
        // A rejecting exclude is final.
        if !accept && is_exclude {
            break;
        }
    }
    accept
}

fn parse_items(
    expression: &str,
    to_pattern: impl Fn(&str) -> String,
) -> Result<Filter, FilterError> {
    let mut filters = Vec::new();
    for item in expression.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let mut chars = item.chars();
        let sign = chars.next();
        let pattern = to_pattern(chars.as_str().trim());
        let filter = match sign {
            Some('+') => Filter::include(&pattern)?,
            Some('-') => Filter::exclude(&pattern)?,
            _ => return Err(FilterError::MissingSign(item.to_string())),
        };
        filters.push(filter);
    }
    Ok(Filter::Composite(filters))
}

fn package_prefix(name: &str) -> String {
    let name = name.trim_end_matches(".*").trim_end_matches('.');
    format!("{}\\..*", regex::escape(name))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Include(pattern) => write!(f, "+{}", pattern.as_str()),
            Filter::Exclude(pattern) => write!(f, "-{}", pattern.as_str()),
            Filter::Composite(filters) => {
                for (position, filter) in filters.iter().enumerate() {
                    if position > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{filter}")?;
                }
                Ok(())
            }
        }
    }
}
