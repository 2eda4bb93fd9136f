use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use hive_core::{FilterRequest, HiveConfig, PageDefaults};
use hive_query::{AdminListing, JobListing, ListingQueryBuilder, TalentListing};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Parser)]
#[command(name = "hive-cli")]
#[command(about = "GoodHive listing query engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Print the statements and bound values a listing query would run.
    Explain {
        /// `jobs`, `talents`, or an admin table (`users` or `admin:users`).
        #[arg(long)]
        listing: String,
        /// URL query string, e.g. `search=rust&page=2`.
        #[arg(long, default_value = "")]
        query: String,
    },
}

fn init_tracing(json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = if json_output {
        fmt::layer().json().with_filter(filter).boxed()
    } else {
        fmt::layer().with_target(true).with_filter(filter).boxed()
    };
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

fn explain_with<B: ListingQueryBuilder>(
    builder: &B,
    filters: &FilterRequest,
    defaults: PageDefaults,
) -> Result<Value> {
    let pagination = filters.pagination(defaults);
    let query = builder
        .compose(filters, pagination, Utc::now())
        .context("composing listing query")?;
    let table = builder.table();
    debug!(table, values = query.values.len(), sort = %query.sort.token, "composed listing query");
    Ok(json!({
        "table": table,
        "sort": query.sort.token,
        "pagination": pagination,
        "count_sql": query.count_statement(table),
        "select_sql": query.select_statement(table),
        "values": query.values,
    }))
}

fn explain(listing: &str, raw_query: &str, defaults: PageDefaults) -> Result<Value> {
    let filters = FilterRequest::from_query_str(raw_query).context("parsing --query")?;
    info!(listing, query = raw_query, "explaining listing query");
    match listing.trim() {
        "jobs" => explain_with(&JobListing, &filters, defaults),
        "talents" => explain_with(&TalentListing, &filters, defaults),
        other => {
            let slug = other.strip_prefix("admin:").unwrap_or(other);
            let admin = AdminListing::for_slug(slug).with_context(|| {
                let known = AdminListing::slugs().collect::<Vec<_>>().join(", ");
                format!("unknown listing {other:?}; expected jobs, talents or admin:<{known}>")
            })?;
            explain_with(&admin, &filters, defaults)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = HiveConfig::from_env();
    init_tracing(config.log_json);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(port = config.web_port, log_json = config.log_json, "starting hive-cli serve");
            hive_web::serve(config).await?
        }
        Commands::Explain { listing, query } => {
            let plan = explain(&listing, &query, config.page_defaults)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_numbers_placeholders_and_pages() {
        let plan = explain("jobs", "search=rust backend&page=3&items=10", PageDefaults::default())
            .unwrap();
        assert_eq!(plan["table"], "job_offers");
        assert_eq!(plan["values"].as_array().unwrap().len(), 6);
        let select = plan["select_sql"].as_str().unwrap();
        assert!(select.contains("$6"));
        assert!(!select.contains("$7"));
        assert!(select.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn explain_admin_tables() {
        let plan = explain("admin:companies", "status=approved", PageDefaults::default()).unwrap();
        assert_eq!(plan["table"], "companies");
        assert!(explain("admin:pg_authid", "", PageDefaults::default()).is_err());
    }
}
