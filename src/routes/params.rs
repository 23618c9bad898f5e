use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

/// Catalog browse parameters. `page` and `limit` arrive as raw strings so
/// malformed values fall back to the defaults instead of rejecting the
/// request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Case-insensitive substring match against name and SKU.
    pub search: Option<String>,
    /// Exact category, or "all" to disable the filter.
    pub category: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    /// "asc" or "desc"; may also arrive via the x-sort-direction header.
    pub sort_dir: Option<String>,
}

impl ProductQuery {
    pub fn page_params(&self) -> (i64, i64, i64) {
        let page = parse_positive(self.page.as_deref(), DEFAULT_PAGE);
        let limit = parse_positive(self.limit.as_deref(), DEFAULT_LIMIT);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

fn parse_positive(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The query parameter wins over the x-sort-direction header; anything
    /// unrecognized falls back to descending.
    pub fn resolve(param: Option<&str>, header: Option<&str>) -> Self {
        match param.or(header).map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, SortDirection::Asc)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_fall_back_on_garbage() {
        let query = ProductQuery {
            page: Some("abc".to_string()),
            limit: Some("-3".to_string()),
            ..Default::default()
        };
        assert_eq!(query.page_params(), (1, 10, 0));
    }

    #[test]
    fn page_params_parse_valid_strings() {
        let query = ProductQuery {
            page: Some("3".to_string()),
            limit: Some("5".to_string()),
            ..Default::default()
        };
        assert_eq!(query.page_params(), (3, 5, 10));
    }

    #[test]
    fn missing_page_params_use_defaults() {
        let query = ProductQuery::default();
        assert_eq!(query.page_params(), (DEFAULT_PAGE, DEFAULT_LIMIT, 0));
    }

    #[test]
    fn sort_direction_prefers_query_param() {
        let dir = SortDirection::resolve(Some("asc"), Some("desc"));
        assert_eq!(dir, SortDirection::Asc);
    }

    #[test]
    fn sort_direction_reads_header_when_param_missing() {
        let dir = SortDirection::resolve(None, Some("ASC"));
        assert_eq!(dir, SortDirection::Asc);
    }

    #[test]
    fn sort_direction_defaults_to_descending() {
        assert_eq!(SortDirection::resolve(None, None), SortDirection::Desc);
        assert_eq!(
            SortDirection::resolve(Some("sideways"), None),
            SortDirection::Desc
        );
    }
}
