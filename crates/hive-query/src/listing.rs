//! One query builder abstraction shared by the job, talent and admin listings.

use chrono::{DateTime, Utc};
use hive_core::{FilterRequest, JobRow, JobView, Pagination, TalentRow, TalentView, ViewerAccess};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::compose::{compose, resolve_sort, ComposeError, ComposedQuery, SortKey, SortSpec};
use crate::filters::{
    build_budget_filter, build_date_filter_at, build_equals_filter, build_flag_filter,
    build_location_filter, build_numeric_bounds, build_text_search_filter,
};
use crate::predicate::{Column, Predicate, PredicateFragment};
use crate::visibility::{job_view, talent_view};

/// Per-entity knowledge needed to turn a [`FilterRequest`] into rows for a viewer.
pub trait ListingQueryBuilder: Send + Sync {
    type Row: DeserializeOwned + Send;
    type View: Serialize + Send;

    /// Table (or view) the listing reads from. Never derived from user input.
    fn table(&self) -> &'static str;

    fn build_predicates(
        &self,
        filters: &FilterRequest,
        now: DateTime<Utc>,
    ) -> Vec<PredicateFragment>;

    /// ORDER BY whitelist; the first entry is the default.
    fn sorts(&self) -> &'static [SortSpec];

    fn map_row(&self, row: Self::Row, access: &ViewerAccess) -> Self::View;

    fn sort_spec(&self, token: Option<&str>) -> SortSpec {
        resolve_sort(self.sorts(), token)
    }

    fn compose(
        &self,
        filters: &FilterRequest,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<ComposedQuery, ComposeError> {
        compose(
            self.build_predicates(filters, now),
            self.sort_spec(filters.sort.as_deref()),
            pagination,
        )
    }
}

mod jobs {
    use super::*;

    pub const TABLE: &str = "job_offers";
    pub const TITLE: Column = Column::text("title");
    pub const DESCRIPTION: Column = Column::text("description");
    pub const SKILLS: Column = Column::text("skills");
    pub const COMPANY_NAME: Column = Column::text("company_name");
    pub const CITY: Column = Column::text("city");
    pub const COUNTRY: Column = Column::text("country");
    pub const BUDGET: Column = Column::numeric_text("budget");
    pub const PROJECT_TYPE: Column = Column::text("project_type");
    pub const CREATED_AT: Column = Column::timestamp("created_at");
    pub const PUBLISHED: Column = Column::flag("published");
    pub const TALENT: Column = Column::flag("talent");
    pub const MENTOR: Column = Column::flag("mentor");
    pub const RECRUITER: Column = Column::flag("recruiter");

    pub const SORTS: &[SortSpec] = &[
        SortSpec::LATEST,
        SortSpec {
            token: "oldest",
            keys: &[SortKey::asc(CREATED_AT)],
        },
        SortSpec {
            token: "budget_high",
            keys: &[SortKey::desc(BUDGET), SortKey::desc(CREATED_AT)],
        },
        SortSpec {
            token: "budget_low",
            keys: &[SortKey::asc(BUDGET), SortKey::desc(CREATED_AT)],
        },
    ];
}

/// Public job board: published offers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobListing;

impl ListingQueryBuilder for JobListing {
    type Row = JobRow;
    type View = JobView;

    fn table(&self) -> &'static str {
        jobs::TABLE
    }

    fn build_predicates(
        &self,
        filters: &FilterRequest,
        now: DateTime<Utc>,
    ) -> Vec<PredicateFragment> {
        vec![
            Predicate::Truthy {
                column: jobs::PUBLISHED,
            }
            .into(),
            build_text_search_filter(
                filters.search.as_deref(),
                &[jobs::TITLE, jobs::DESCRIPTION, jobs::SKILLS],
            ),
            build_text_search_filter(filters.name.as_deref(), &[jobs::COMPANY_NAME]),
            build_location_filter(filters.location.as_deref(), jobs::CITY, jobs::COUNTRY),
            build_date_filter_at(filters.date_posted.as_deref(), jobs::CREATED_AT, now),
            build_budget_filter(filters.budget_range.as_deref(), jobs::BUDGET),
            build_equals_filter(filters.project_type.as_deref(), jobs::PROJECT_TYPE),
            build_flag_filter(filters.only_talent.as_deref(), jobs::TALENT),
            build_flag_filter(filters.only_mentor.as_deref(), jobs::MENTOR),
            build_flag_filter(filters.only_recruiter.as_deref(), jobs::RECRUITER),
        ]
    }

    fn sorts(&self) -> &'static [SortSpec] {
        jobs::SORTS
    }

    fn map_row(&self, row: JobRow, access: &ViewerAccess) -> JobView {
        job_view(row, access)
    }
}

mod talents {
    use super::*;

    pub const TABLE: &str = "talents";
    pub const TITLE: Column = Column::text("title");
    pub const DESCRIPTION: Column = Column::text("description");
    pub const SKILLS: Column = Column::text("skills");
    pub const FIRST_NAME: Column = Column::text("first_name");
    pub const LAST_NAME: Column = Column::text("last_name");
    pub const CITY: Column = Column::text("city");
    pub const COUNTRY: Column = Column::text("country");
    pub const RATE: Column = Column::numeric_text("rate");
    pub const CREATED_AT: Column = Column::timestamp("created_at");
    pub const TALENT: Column = Column::flag("talent");
    pub const MENTOR: Column = Column::flag("mentor");
    pub const RECRUITER: Column = Column::flag("recruiter");
    pub const REMOTE_ONLY: Column = Column::flag("remote_only");
    pub const FREELANCE_ONLY: Column = Column::flag("freelance_only");

    pub const SORTS: &[SortSpec] = &[
        SortSpec::LATEST,
        SortSpec {
            token: "oldest",
            keys: &[SortKey::asc(CREATED_AT)],
        },
        SortSpec {
            token: "rate_high",
            keys: &[SortKey::desc(RATE), SortKey::desc(CREATED_AT)],
        },
        SortSpec {
            token: "rate_low",
            keys: &[SortKey::asc(RATE), SortKey::desc(CREATED_AT)],
        },
        SortSpec {
            token: "name",
            keys: &[SortKey::asc(FIRST_NAME), SortKey::asc(LAST_NAME)],
        },
    ];
}

/// Talent directory with tiered redaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TalentListing;

impl ListingQueryBuilder for TalentListing {
    type Row = TalentRow;
    type View = TalentView;

    fn table(&self) -> &'static str {
        talents::TABLE
    }

    fn build_predicates(
        &self,
        filters: &FilterRequest,
        now: DateTime<Utc>,
    ) -> Vec<PredicateFragment> {
        vec![
            build_text_search_filter(
                filters.search.as_deref(),
                &[
                    talents::TITLE,
                    talents::DESCRIPTION,
                    talents::SKILLS,
                    talents::FIRST_NAME,
                    talents::LAST_NAME,
                ],
            ),
            build_text_search_filter(
                filters.name.as_deref(),
                &[talents::FIRST_NAME, talents::LAST_NAME],
            ),
            build_location_filter(filters.location.as_deref(), talents::CITY, talents::COUNTRY),
            build_date_filter_at(filters.date_posted.as_deref(), talents::CREATED_AT, now),
            build_numeric_bounds(
                filters.min_rate.as_deref(),
                filters.max_rate.as_deref(),
                talents::RATE,
            ),
            build_flag_filter(filters.only_talent.as_deref(), talents::TALENT),
            build_flag_filter(filters.only_mentor.as_deref(), talents::MENTOR),
            build_flag_filter(filters.only_recruiter.as_deref(), talents::RECRUITER),
            build_flag_filter(filters.remote_only.as_deref(), talents::REMOTE_ONLY),
            build_flag_filter(filters.freelance_only.as_deref(), talents::FREELANCE_ONLY),
        ]
    }

    fn sorts(&self) -> &'static [SortSpec] {
        talents::SORTS
    }

    fn map_row(&self, row: TalentRow, access: &ViewerAccess) -> TalentView {
        talent_view(row, access)
    }
}

/// How a table encodes the review state the admin `status` filter selects on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusScheme {
    /// `approved` / `inreview` flag pair.
    ApprovalFlags { approved: Column, in_review: Column },
    /// Per-role status text (`"approved"`, `"pending"`, ...); any role may match.
    RoleStatus(&'static [Column]),
    /// A single published flag.
    Published(Column),
}

impl StatusScheme {
    fn fragment(&self, raw: Option<&str>) -> PredicateFragment {
        let Some(status) = raw
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
        else {
            return PredicateFragment::empty();
        };
        let predicate = match (self, status.as_str()) {
            (StatusScheme::ApprovalFlags { approved, .. }, "approved") => {
                Predicate::Truthy { column: *approved }
            }
            (
                StatusScheme::ApprovalFlags {
                    approved,
                    in_review,
                },
                "pending" | "in_review" | "inreview",
            ) => Predicate::All(vec![
                Predicate::Falsy { column: *approved },
                Predicate::Truthy { column: *in_review },
            ]),
            (
                StatusScheme::ApprovalFlags {
                    approved,
                    in_review,
                },
                "rejected",
            ) => Predicate::All(vec![
                Predicate::Falsy { column: *approved },
                Predicate::Falsy { column: *in_review },
            ]),
            (
                StatusScheme::RoleStatus(columns),
                "approved" | "pending" | "rejected" | "deferred",
            ) => Predicate::Equals {
                columns: columns.to_vec(),
                value: status.clone(),
            },
            (StatusScheme::Published(column), "published") => {
                Predicate::Truthy { column: *column }
            }
            (StatusScheme::Published(column), "draft" | "unpublished") => {
                Predicate::Falsy { column: *column }
            }
            _ => {
                debug!(status = %status, "ignoring unknown status filter");
                return PredicateFragment::empty();
            }
        };
        predicate.into()
    }
}

/// Static description of one back-office table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminTableSpec {
    pub slug: &'static str,
    pub table: &'static str,
    pub search_columns: &'static [Column],
    pub name_columns: &'static [Column],
    pub location: Option<(Column, Column)>,
    pub date_column: Column,
    pub status: StatusScheme,
    pub sorts: &'static [SortSpec],
}

mod admin {
    use super::*;

    const CREATED_AT: Column = Column::timestamp("created_at");
    const CITY: Column = Column::text("city");
    const COUNTRY: Column = Column::text("country");
    const EMAIL: Column = Column::text("email");
    const FIRST_NAME: Column = Column::text("first_name");
    const LAST_NAME: Column = Column::text("last_name");
    const DESIGNATION: Column = Column::text("designation");
    const TITLE: Column = Column::text("title");

    const OLDEST: SortSpec = SortSpec {
        token: "oldest",
        keys: &[SortKey::asc(CREATED_AT)],
    };

    pub const USERS: AdminTableSpec = AdminTableSpec {
        slug: "users",
        table: "users",
        search_columns: &[EMAIL, Column::text("userid"), Column::text("wallet_address")],
        name_columns: &[EMAIL],
        location: None,
        date_column: CREATED_AT,
        status: StatusScheme::RoleStatus(&[
            Column::text("talent_status"),
            Column::text("mentor_status"),
            Column::text("recruiter_status"),
        ]),
        sorts: &[
            SortSpec::LATEST,
            OLDEST,
            SortSpec {
                token: "name",
                keys: &[SortKey::asc(EMAIL)],
            },
        ],
    };

    pub const TALENTS: AdminTableSpec = AdminTableSpec {
        slug: "talents",
        table: "talents",
        search_columns: &[FIRST_NAME, LAST_NAME, EMAIL, TITLE, Column::text("skills")],
        name_columns: &[FIRST_NAME, LAST_NAME],
        location: Some((CITY, COUNTRY)),
        date_column: CREATED_AT,
        status: StatusScheme::ApprovalFlags {
            approved: Column::flag("approved"),
            in_review: Column::flag("inreview"),
        },
        sorts: &[
            SortSpec::LATEST,
            OLDEST,
            SortSpec {
                token: "name",
                keys: &[SortKey::asc(FIRST_NAME), SortKey::asc(LAST_NAME)],
            },
        ],
    };

    pub const COMPANIES: AdminTableSpec = AdminTableSpec {
        slug: "companies",
        table: "companies",
        search_columns: &[DESIGNATION, EMAIL, Column::text("headline")],
        name_columns: &[DESIGNATION],
        location: Some((CITY, COUNTRY)),
        date_column: CREATED_AT,
        status: StatusScheme::ApprovalFlags {
            approved: Column::flag("approved"),
            in_review: Column::flag("inreview"),
        },
        sorts: &[
            SortSpec::LATEST,
            OLDEST,
            SortSpec {
                token: "name",
                keys: &[SortKey::asc(DESIGNATION)],
            },
        ],
    };

    pub const JOBS: AdminTableSpec = AdminTableSpec {
        slug: "jobs",
        table: "job_offers",
        search_columns: &[TITLE, Column::text("description"), Column::text("skills")],
        name_columns: &[Column::text("company_name")],
        location: Some((CITY, COUNTRY)),
        date_column: CREATED_AT,
        status: StatusScheme::Published(Column::flag("published")),
        sorts: &[
            SortSpec::LATEST,
            OLDEST,
            SortSpec {
                token: "name",
                keys: &[SortKey::asc(TITLE)],
            },
        ],
    };

    pub const ALL: &[AdminTableSpec] = &[USERS, TALENTS, COMPANIES, JOBS];
}

/// Back-office listing over one table. Rows are passed through unredacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminListing {
    spec: AdminTableSpec,
}

impl AdminListing {
    pub fn for_slug(slug: &str) -> Option<Self> {
        admin::ALL
            .iter()
            .find(|spec| spec.slug.eq_ignore_ascii_case(slug.trim()))
            .map(|spec| Self { spec: *spec })
    }

    pub fn slugs() -> impl Iterator<Item = &'static str> {
        admin::ALL.iter().map(|spec| spec.slug)
    }

    pub fn spec(&self) -> &AdminTableSpec {
        &self.spec
    }
}

impl ListingQueryBuilder for AdminListing {
    type Row = Value;
    type View = Value;

    fn table(&self) -> &'static str {
        self.spec.table
    }

    fn build_predicates(
        &self,
        filters: &FilterRequest,
        now: DateTime<Utc>,
    ) -> Vec<PredicateFragment> {
        let mut fragments = vec![
            build_text_search_filter(filters.search.as_deref(), self.spec.search_columns),
            build_text_search_filter(filters.name.as_deref(), self.spec.name_columns),
            build_date_filter_at(filters.date_posted.as_deref(), self.spec.date_column, now),
            self.spec.status.fragment(filters.status.as_deref()),
        ];
        if let Some((city, country)) = self.spec.location {
            fragments.push(build_location_filter(filters.location.as_deref(), city, country));
        }
        fragments
    }

    fn sorts(&self) -> &'static [SortSpec] {
        self.spec.sorts
    }

    fn map_row(&self, row: Value, _access: &ViewerAccess) -> Value {
        row
    }
}
