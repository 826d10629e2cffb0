//! End-to-end request handling through `FilterPipeline`

use qfilter::{
    Denial, DocumentBackend, Error, FilterConfig, FilterPipeline, PassThrough, RelationalBackend,
    RequestContext, SortKey,
};
use qfilter::config::MAX_INPUT_LENGTH;
use serde_json::json;

mod test_support;
use test_support::{admin, registry, user};

fn config() -> FilterConfig {
    FilterConfig {
        public_routes: vec!["/public/users".into()],
        ..FilterConfig::default()
    }
}

#[test]
fn test_filter_runs_every_stage() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, DocumentBackend);
    let admin = admin();
    let ctx = RequestContext::new("/users", Some(&admin));

    let expr = pipeline
        .filter("User", "age >= 18 and name = 'jo'*", &ctx)
        .unwrap();
    assert_eq!(
        expr.into_value(),
        json!({ "$and": [
            { "age": { "$gte": 18 } },
            { "name": { "$regex": "^jo", "$options": "i" } },
        ] })
    );
}

#[test]
fn test_length_cap_comes_first() {
    let config = FilterConfig {
        max_input_length: 8,
        ..FilterConfig::default()
    };
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let ctx = RequestContext::anonymous("/users");

    // Rejected before the entity lookup
    let err = pipeline.filter("Order", "age >= 18 and", &ctx).unwrap_err();
    assert_eq!(err, Error::InputTooLong { length: 13, max: 8 });
    assert_eq!(err.status_code(), 422);
}

#[test]
fn test_unknown_entity() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let err = pipeline
        .filter("Order", "total > 1", &RequestContext::anonymous("/orders"))
        .unwrap_err();
    assert_eq!(err, Error::UnknownEntity("Order".into()));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn test_syntax_errors_are_reported_on_the_parameter() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let err = pipeline
        .filter("User", "age >=", &RequestContext::anonymous("/users"))
        .unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));

    let body = err.to_response("filter");
    assert_eq!(body.status_code, 422);
    assert_eq!(body.message.len(), 1);
    assert_eq!(body.message[0].path, "filter");
}

#[test]
fn test_semantic_errors_list_every_field() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let err = pipeline
        .filter(
            "User",
            "phone = 1 and age = 'x'",
            &RequestContext::anonymous("/users"),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 422);

    let body = serde_json::to_value(err.to_response("filter")).unwrap();
    assert_eq!(body["statusCode"], 422);
    assert_eq!(body["error"], "Unprocessable Entity");
    assert_eq!(body["message"][0]["path"], "phone");
    assert_eq!(body["message"][1]["path"], "age");
    assert!(body.get("field").is_none());
}

#[test]
fn test_semantic_errors_win_over_authorization() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let user = user();
    let err = pipeline
        .filter(
            "User",
            "name = 'x' and age = 'x'",
            &RequestContext::new("/users", Some(&user)),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Semantic(_)));
}

#[test]
fn test_authorization_failures() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);

    let user = user();
    let err = pipeline
        .filter("User", "name = 'x'", &RequestContext::new("/users", Some(&user)))
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    let body = err.to_response("filter");
    assert_eq!(body.field.as_deref(), Some("name"));
    assert!(body.message.is_empty());

    let err = pipeline
        .filter("User", "name = 'x'", &RequestContext::anonymous("/users"))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Authorization(ref e) if e.denial == Denial::Unauthenticated
    ));
    assert_eq!(err.status_code(), 401);
}

#[test]
fn test_public_routes_skip_authorization() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let ctx = RequestContext::anonymous("/public/users");

    assert!(pipeline.filter("User", "name = 'x'", &ctx).is_ok());
    // Validation still applies
    assert!(pipeline.filter("User", "phone = 'x'", &ctx).is_err());
}

#[test]
fn test_conversion_errors_surface_as_unprocessable() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, DocumentBackend);
    let err = pipeline
        .filter(
            "User",
            "not (age = 1 or email = 'x')",
            &RequestContext::anonymous("/users"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
    assert_eq!(err.status_code(), 422);

    // The relational backend can negate a disjunction
    let pipeline = FilterPipeline::new(registry(), &config, RelationalBackend);
    assert!(pipeline
        .filter(
            "User",
            "not (age = 1 or email = 'x')",
            &RequestContext::anonymous("/users"),
        )
        .is_ok());
}

#[test]
fn test_long_chains_stop_at_the_parser() {
    let config = FilterConfig {
        max_input_length: MAX_INPUT_LENGTH,
        ..FilterConfig::default()
    };
    let pipeline = FilterPipeline::new(registry(), &config, RelationalBackend);
    let ctx = RequestContext::anonymous("/users");
    let chain = |terms: usize| {
        (0..terms)
            .map(|i| format!("age = {}", i))
            .collect::<Vec<_>>()
            .join(" or ")
    };

    let predicate = pipeline.filter("User", &chain(200), &ctx).unwrap();
    assert_eq!(predicate.alternatives().len(), 200);

    for terms in [300, 1000] {
        let err = pipeline.filter("User", &chain(terms), &ctx).unwrap_err();
        assert!(matches!(err, Error::Syntax(_)), "{}: {:?}", terms, err);
        assert_eq!(err.status_code(), 422);
    }
}

#[test]
fn test_order_parameter() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let ctx = RequestContext::anonymous("/users");

    let keys = pipeline.order("User", "-age, email asc", &ctx).unwrap();
    assert_eq!(keys, vec![SortKey::desc("age"), SortKey::asc("email")]);

    assert!(matches!(
        pipeline.order("User", "phone", &ctx),
        Err(Error::Semantic(_))
    ));
    assert!(matches!(
        pipeline.order("User", "age,,email", &ctx),
        Err(Error::Syntax(_))
    ));
    assert_eq!(
        pipeline.order("User", "name", &ctx).unwrap_err().status_code(),
        401
    );
}

#[test]
fn test_select_parameter() {
    let config = config();
    let pipeline = FilterPipeline::new(registry(), &config, PassThrough);
    let user = user();
    let ctx = RequestContext::new("/users", Some(&user));

    assert_eq!(
        pipeline.select("User", "id, email", &ctx).unwrap(),
        vec!["id".to_string(), "email".to_string()]
    );
    assert_eq!(
        pipeline.select("User", "id,salary", &ctx).unwrap_err().status_code(),
        403
    );
    // Write-only fields cannot be selected at all
    assert!(matches!(
        pipeline.select("User", "password", &ctx),
        Err(Error::Semantic(_))
    ));
}
