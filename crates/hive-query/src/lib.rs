//! Filter parsing, SQL composition and field visibility for GoodHive listings.

pub mod compose;
pub mod filters;
pub mod listing;
pub mod predicate;
pub mod visibility;

pub use compose::{compose, resolve_sort, ComposeError, ComposedQuery, SortKey, SortSpec};
pub use filters::{
    build_budget_filter, build_date_filter, build_date_filter_at, build_equals_filter,
    build_flag_filter, build_location_filter, build_numeric_bounds, build_text_search_filter,
    expand_location_term, sanitize_search_input,
};
pub use listing::{
    AdminListing, AdminTableSpec, JobListing, ListingQueryBuilder, StatusScheme, TalentListing,
};
pub use predicate::{Bound, Column, ColumnKind, Predicate, PredicateFragment};
pub use visibility::{format_name_for_tier, job_view, mask_name_in_text, talent_view};

pub const CRATE_NAME: &str = "hive-query";
