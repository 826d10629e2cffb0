//! qfilter - run filter, order and select parameters through the pipeline
//!
//! Usage:
//!   qfilter parse "age >= 18 and name = 'jo'*"
//!   qfilter convert --schema entities.json --entity User --backend sql \
//!       --roles Admin --order "-age" "age >= 18"
//!   qfilter eval --schema entities.json --entity User --data users.json "active = true"

mod config;
mod logging;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use qfilter::convert::{document, relational};
use qfilter::{
    DocumentBackend, EntityRegistry, FilterPipeline, Identity, PassThrough, RelationalBackend,
    RequestContext, SortKey,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::Config;

#[derive(Parser, Debug)]
#[clap(name = "qfilter")]
#[clap(about = "Parse, validate and convert query filter expressions")]
struct Cli {
    /// Configuration file (defaults to ./qfilter.toml when present)
    #[clap(short, long, global = true)]
    config: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the AST of a filter
    Parse {
        filter: String,
    },
    /// Resolve and authorize a filter against an entity
    Check {
        #[clap(flatten)]
        request: RequestArgs,
        filter: String,
    },
    /// Convert a filter (and optional order/select) for a backend
    Convert {
        #[clap(flatten)]
        request: RequestArgs,
        #[clap(short, long, value_enum, default_value = "document")]
        backend: BackendKind,
        /// Sort parameter, e.g. "-age,name"
        #[clap(long)]
        order: Option<String>,
        /// Projection parameter, e.g. "id,email"
        #[clap(long)]
        select: Option<String>,
        filter: String,
    },
    /// Print the documents of a JSON array file that match a filter
    Eval {
        #[clap(flatten)]
        request: RequestArgs,
        #[clap(short, long)]
        data: PathBuf,
        filter: String,
    },
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// JSON file with an array of entity schemas
    #[clap(short, long)]
    schema: PathBuf,

    #[clap(short, long)]
    entity: String,

    /// Caller roles, comma separated
    #[clap(short, long, value_delimiter = ',')]
    roles: Vec<String>,

    /// Caller subject; with neither subject nor roles the caller is anonymous
    #[clap(long)]
    subject: Option<String>,

    /// Route the request is made on
    #[clap(long, default_value = "/")]
    route: String,
}

impl RequestArgs {
    fn identity(&self) -> Option<Identity> {
        if self.subject.is_none() && self.roles.is_empty() {
            return None;
        }
        Some(Identity {
            subject: self.subject.clone(),
            roles: self.roles.iter().cloned().collect(),
        })
    }

    fn registry(&self) -> anyhow::Result<EntityRegistry> {
        let json = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("Failed to read schema file {}", self.schema.display()))?;
        Ok(EntityRegistry::from_json(&json)?)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendKind {
    /// The AST, unchanged
    Ast,
    /// Mongo-style filter document
    Document,
    /// ORM-style find options
    Relational,
    /// Parameterized SQL
    Sql,
}

/// A pipeline failure, tagged with the parameter it came from
struct Rejected {
    parameter: &'static str,
    error: qfilter::Error,
}

fn rejected(parameter: &'static str) -> impl FnOnce(qfilter::Error) -> Rejected {
    move |error| Rejected { parameter, error }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    let outcome = match &cli.command {
        Command::Parse { filter } => qfilter::parse_filter_with(filter, &config.filter)
            .map(|ast| json!(ast))
            .map_err(rejected("filter")),
        Command::Check { request, filter } => check(&config, request, filter)?,
        Command::Convert {
            request,
            backend,
            order,
            select,
            filter,
        } => convert(
            &config,
            request,
            *backend,
            filter,
            order.as_deref(),
            select.as_deref(),
        )?,
        Command::Eval {
            request,
            data,
            filter,
        } => eval(&config, request, data, filter)?,
    };

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(Rejected { parameter, error }) => {
            tracing::info!(parameter, status = error.status_code(), "Request rejected: {error}");
            let body = error.to_response(parameter);
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check(
    config: &Config,
    request: &RequestArgs,
    filter: &str,
) -> anyhow::Result<Result<Value, Rejected>> {
    let registry = request.registry()?;
    let identity = request.identity();
    let ctx = RequestContext::new(&request.route, identity.as_ref());
    let pipeline = FilterPipeline::new(&registry, &config.filter, PassThrough);

    Ok(pipeline
        .filter(&request.entity, filter, &ctx)
        .map(|ast| {
            let fields: Vec<&str> = ast.comparisons().iter().map(|c| c.key.as_str()).collect();
            json!({ "valid": true, "fields": fields })
        })
        .map_err(rejected("filter")))
}

fn convert(
    config: &Config,
    request: &RequestArgs,
    backend: BackendKind,
    filter: &str,
    order: Option<&str>,
    select: Option<&str>,
) -> anyhow::Result<Result<Value, Rejected>> {
    let registry = request.registry()?;
    let identity = request.identity();
    let ctx = RequestContext::new(&request.route, identity.as_ref());
    let filter_config = &config.filter;

    // Order and select are validated the same way for every backend
    let sort_and_select = || -> Result<(Vec<SortKey>, Vec<String>), Rejected> {
        let pipeline = FilterPipeline::new(&registry, filter_config, PassThrough);
        let keys = match order {
            Some(raw) => pipeline
                .order(&request.entity, raw, &ctx)
                .map_err(rejected("order"))?,
            None => Vec::new(),
        };
        let fields = match select {
            Some(raw) => pipeline
                .select(&request.entity, raw, &ctx)
                .map_err(rejected("select"))?,
            None => Vec::new(),
        };
        Ok((keys, fields))
    };

    let outcome = match backend {
        BackendKind::Ast => FilterPipeline::new(&registry, filter_config, PassThrough)
            .filter(&request.entity, filter, &ctx)
            .map_err(rejected("filter"))
            .and_then(|ast| {
                let (keys, fields) = sort_and_select()?;
                Ok(json!({ "filter": ast, "order": keys, "select": fields }))
            }),
        BackendKind::Document => FilterPipeline::new(&registry, filter_config, DocumentBackend)
            .filter(&request.entity, filter, &ctx)
            .map_err(rejected("filter"))
            .and_then(|expr| {
                let (keys, fields) = sort_and_select()?;
                Ok(json!({
                    "filter": expr.into_value(),
                    "sort": document::sort_document(&keys),
                    "projection": document::projection(&fields),
                }))
            }),
        BackendKind::Relational => FilterPipeline::new(&registry, filter_config, RelationalBackend)
            .filter(&request.entity, filter, &ctx)
            .map_err(rejected("filter"))
            .and_then(|predicate| {
                let (keys, fields) = sort_and_select()?;
                Ok(json!({ "where": predicate, "order": keys, "select": fields }))
            }),
        BackendKind::Sql => FilterPipeline::new(&registry, filter_config, RelationalBackend)
            .filter(&request.entity, filter, &ctx)
            .map_err(rejected("filter"))
            .and_then(|predicate| {
                let (keys, fields) = sort_and_select()?;
                let query = predicate.to_sql();
                Ok(json!({
                    "select": relational::select_columns(&fields),
                    "where": query.clause,
                    "binds": query.binds,
                    "orderBy": relational::order_by(&keys),
                }))
            }),
    };
    Ok(outcome)
}

fn eval(
    config: &Config,
    request: &RequestArgs,
    data: &Path,
    filter: &str,
) -> anyhow::Result<Result<Value, Rejected>> {
    let registry = request.registry()?;
    let identity = request.identity();
    let ctx = RequestContext::new(&request.route, identity.as_ref());

    let raw = std::fs::read_to_string(data)
        .with_context(|| format!("Failed to read data file {}", data.display()))?;
    let documents: Vec<Value> =
        serde_json::from_str(&raw).context("Data file must hold a JSON array")?;

    Ok(FilterPipeline::new(&registry, &config.filter, PassThrough)
        .filter(&request.entity, filter, &ctx)
        .map(|ast| {
            let matched: Vec<&Value> = documents.iter().filter(|doc| ast.matches(doc)).collect();
            tracing::debug!(total = documents.len(), matched = matched.len(), "Evaluated filter");
            json!(matched)
        })
        .map_err(rejected("filter")))
}
