//! End-to-end resolution through `AuthPipeline`.

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_auth_core::{AuthContext, AuthDataBundle, Principal};
use strata_identity_pipeline::{
    AuthOptions, AuthPipeline, IdentityError, LifecycleMethod, ProviderAdapter, ProviderConfig,
    ValidationOutcome,
};

fn lifecycle_adapter() -> ProviderAdapter {
    ProviderAdapter::new()
        .with_validate_set_up(|_, _, _| async move { Ok(json!("setUp")) })
        .with_validate_login(|_, _, _| async move { Ok(json!("login")) })
        .with_validate_update(|_, _, _| async move { Ok(json!("update")) })
}

fn pipeline_with(name: &str, adapter: ProviderAdapter) -> AuthPipeline {
    AuthPipeline::new(
        AuthOptions::new().with_provider(name, ProviderConfig::new().with_adapter(adapter)),
        true,
    )
}

fn linked_user() -> Principal {
    Principal::new("user-1")
        .with_auth_data(AuthDataBundle::new().with("acme", json!({ "id": "acme-1" })))
}

async fn run(
    pipeline: &AuthPipeline,
    auth: &AuthContext,
    principal: Option<&Principal>,
) -> Result<(Option<LifecycleMethod>, Value), IdentityError> {
    let validator = pipeline
        .get_validator_for_provider("acme")?
        .and_then(|found| found.validator)
        .expect("acme is configured");
    let outcome = validator
        .validate(json!({ "id": "acme-1" }), auth, principal, auth.provider_request())
        .await?;
    let method = outcome.method();
    Ok((method, outcome.resolve().await?))
}

#[tokio::test]
async fn test_lifecycle_method_for_every_state() {
    let pipeline = pipeline_with("acme", lifecycle_adapter());
    let linked = linked_user();
    let unlinked = Principal::new("user-1");

    let cases = [
        // logged in as the same user, provider linked
        (AuthContext::for_user(linked.clone()), Some(&linked), LifecycleMethod::ValidateUpdate, "update"),
        // logged in, provider not linked yet
        (AuthContext::for_user(unlinked.clone()), Some(&unlinked), LifecycleMethod::ValidateSetUp, "setUp"),
        // not logged in, provider linked on the target user
        (AuthContext::anonymous(), Some(&linked), LifecycleMethod::ValidateLogin, "login"),
        // not logged in, nobody has the provider: sign-up
        (AuthContext::anonymous(), None, LifecycleMethod::ValidateSetUp, "setUp"),
    ];

    for (auth, principal, expected_method, expected_result) in cases {
        let (method, result) = run(&pipeline, &auth, principal).await.unwrap();
        assert_eq!(method, Some(expected_method));
        assert_eq!(result, json!(expected_result));
    }
}

#[tokio::test]
async fn test_master_key_counts_as_logged_in() {
    let pipeline = pipeline_with("acme", lifecycle_adapter());
    let linked = linked_user();

    let (method, _) = run(&pipeline, &AuthContext::master(), Some(&linked)).await.unwrap();
    assert_eq!(method, Some(LifecycleMethod::ValidateUpdate));

    // Master without a target principal is not "logged in" as anyone.
    let (method, _) = run(&pipeline, &AuthContext::master(), None).await.unwrap();
    assert_eq!(method, Some(LifecycleMethod::ValidateSetUp));
}

#[tokio::test]
async fn test_other_user_session_is_not_logged_in() {
    let pipeline = pipeline_with("acme", lifecycle_adapter());
    let linked = linked_user();
    let intruder = AuthContext::for_user(Principal::new("user-2"));

    let (method, _) = run(&pipeline, &intruder, Some(&linked)).await.unwrap();
    assert_eq!(method, Some(LifecycleMethod::ValidateLogin));
}

#[tokio::test]
async fn test_validate_auth_data_bypasses_lifecycle() {
    let pipeline = pipeline_with(
        "acme",
        lifecycle_adapter().with_validate_auth_data(|auth_data, _, _| async move {
            Ok(json!({ "checked": auth_data["id"] }))
        }),
    );
    let linked = linked_user();

    let states = [
        (AuthContext::for_user(linked.clone()), Some(&linked)),
        (AuthContext::anonymous(), Some(&linked)),
        (AuthContext::anonymous(), None),
        (AuthContext::master(), Some(&linked)),
    ];
    for (auth, principal) in states {
        let (method, result) = run(&pipeline, &auth, principal).await.unwrap();
        assert_eq!(method, None);
        assert_eq!(result, json!({ "checked": "acme-1" }));
    }
}

#[tokio::test]
async fn test_inherited_login_stub_is_not_an_implementation() {
    let adapter = ProviderAdapter::base()
        .with_validate_set_up(|_, _, _| async move { Ok(json!("setUp")) })
        .with_validate_update(|_, _, _| async move { Ok(json!("update")) });
    let pipeline = pipeline_with("acme", adapter);

    let err = run(&pipeline, &AuthContext::anonymous(), None).await.unwrap_err();
    match err {
        IdentityError::Configuration(message) => {
            assert!(message.ends_with("(missing: validateLogin)"));
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lifecycle_method_not_run_until_requested() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let adapter = lifecycle_adapter().with_validate_set_up(move |_, _, _| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(json!("setUp"))
        }
    });
    let pipeline = pipeline_with("acme", adapter);
    let validator = pipeline
        .get_validator_for_provider("acme")
        .unwrap()
        .and_then(|found| found.validator)
        .unwrap();

    let auth = AuthContext::anonymous();
    let outcome = validator
        .validate(json!({}), &auth, None, auth.provider_request())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let ValidationOutcome::Directive(directive) = outcome else {
        panic!("expected a directive");
    };
    assert_eq!(directive.method, LifecycleMethod::ValidateSetUp);
    directive.validator.run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_after_find_replaces_non_empty_results() {
    let options = AuthOptions::new()
        .with_provider(
            "masked",
            ProviderConfig::from_value(json!({ "mask": "***" }))
                .unwrap()
                .with_adapter(lifecycle_adapter().with_after_find(|stored, options, request| {
                    async move {
                        Ok(Some(json!({
                            "id": stored["id"],
                            "token": options["mask"],
                            "master": request.master,
                        })))
                    }
                })),
        )
        .with_provider(
            "untouched",
            ProviderConfig::new()
                .with_adapter(lifecycle_adapter().with_after_find(|_, _, _| async move { Ok(None) })),
        );
    let pipeline = AuthPipeline::new(options, true);

    let mut bundle = AuthDataBundle::new()
        .with("masked", json!({ "id": "m1", "token": "secret" }))
        .with("untouched", json!({ "id": "u1" }))
        .with("anonymous", json!({ "id": "anon" }))
        .with("unknown", json!({ "id": "?" }));

    pipeline
        .run_after_find(&AuthContext::master(), &mut bundle)
        .await
        .unwrap();

    assert_eq!(
        bundle.get("masked"),
        Some(&json!({ "id": "m1", "token": "***", "master": true }))
    );
    assert_eq!(bundle.get("untouched"), Some(&json!({ "id": "u1" })));
    assert_eq!(bundle.get("anonymous"), Some(&json!({ "id": "anon" })));
    assert_eq!(bundle.get("unknown"), Some(&json!({ "id": "?" })));
}

#[tokio::test]
async fn test_after_find_ignores_unlinked_replacements() {
    let mut options = AuthOptions::new();
    for (provider, replacement) in [("blank", json!("")), ("off", json!(false)), ("nulled", json!(null))] {
        options = options.with_provider(
            provider,
            ProviderConfig::new().with_adapter(lifecycle_adapter().with_after_find(
                move |_, _, _| {
                    let replacement = replacement.clone();
                    async move { Ok(Some(replacement)) }
                },
            )),
        );
    }
    let pipeline = AuthPipeline::new(options, true);

    let mut bundle = AuthDataBundle::new()
        .with("blank", json!({ "id": "x" }))
        .with("off", json!({ "id": "y" }))
        .with("nulled", json!({ "id": "z" }));
    pipeline
        .run_after_find(&AuthContext::anonymous(), &mut bundle)
        .await
        .unwrap();

    assert_eq!(bundle.get("blank"), Some(&json!({ "id": "x" })));
    assert_eq!(bundle.get("off"), Some(&json!({ "id": "y" })));
    assert_eq!(bundle.get("nulled"), Some(&json!({ "id": "z" })));
    assert!(bundle.is_configured("blank"));
}

#[tokio::test]
async fn test_after_find_failure_propagates() {
    let options = AuthOptions::new()
        .with_provider(
            "ok",
            ProviderConfig::new().with_adapter(
                lifecycle_adapter().with_after_find(|_, _, _| async move { Ok(Some(json!("ok"))) }),
            ),
        )
        .with_provider(
            "broken",
            ProviderConfig::new().with_adapter(lifecycle_adapter().with_after_find(
                |_, _, _| async move { Err(IdentityError::rejected("afterFind failed")) },
            )),
        );
    let pipeline = AuthPipeline::new(options, true);

    let mut bundle = AuthDataBundle::new()
        .with("ok", json!({}))
        .with("broken", json!({}));
    let err = pipeline
        .run_after_find(&AuthContext::anonymous(), &mut bundle)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("afterFind failed"));
}
