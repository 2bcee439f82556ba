use super::*;
use yare::parameterized;

#[parameterized(
    foobar_allowed = { "foobar", true },
    barfoo_denied = { "barfoo", false },
    empty_name_denied = { "", false },
)]
fn test_load_then_evaluate(name: &str, expected: bool) {
    let (engine, _file) = engine_from_policy(ALLOW_FOOBAR_POLICY);
    let result = engine
        .evaluate(&EvalContext::background(), &named_input(name))
        .unwrap();
    assert_eq!(result.allowed(), expected);
}

#[test]
fn test_load_nonexistent_path() {
    let err = PolicyEngine::load_from_path("no/such/policy.rego", QUERY).unwrap_err();
    assert!(err.is_load_error(), "expected LoadError, got {err}");
}

#[test]
fn test_load_malformed_policy() {
    let file = policy_file("package policy\n\nallow {{{");
    let err = PolicyEngine::load_from_path(file.path(), QUERY).unwrap_err();
    assert!(err.is_load_error(), "expected LoadError, got {err}");
}

#[test]
fn test_load_rejects_invalid_query_reference() {
    let file = policy_file(ALLOW_FOOBAR_POLICY);
    let err = PolicyEngine::load_from_path(file.path(), "data..allow").unwrap_err();
    assert!(matches!(err, PolicyError::InvalidQuery(_)));

    let err = PolicyEngine::load_from_path(file.path(), "").unwrap_err();
    assert!(matches!(err, PolicyError::InvalidQuery(_)));
}

#[test]
fn test_unresolvable_query_surfaces_at_evaluation() {
    // Rule existence is not validated at load time.
    let file = policy_file(ALLOW_FOOBAR_POLICY);
    let engine = PolicyEngine::load_from_path(file.path(), "data.policy.missing").unwrap();

    let result = engine
        .evaluate(&EvalContext::background(), &named_input("foobar"))
        .unwrap();
    assert!(result.is_empty());
    assert!(!result.allowed());
}

#[test]
fn test_evaluate_with_options() {
    let (engine, _file) = engine_from_policy(ALLOW_FOOBAR_POLICY);
    let options = EvalOptions::new()
        .with_trace(true)
        .with_strict_builtin_errors(true);
    let result = engine
        .evaluate_with_options(&EvalContext::background(), &named_input("foobar"), &options)
        .unwrap();
    assert!(result.allowed());
}

#[test]
fn test_evaluation_does_not_mutate_handle() {
    let (engine, _file) = engine_from_policy(ALLOW_FOOBAR_POLICY);
    let version_before = engine.current_version().unwrap();

    engine
        .evaluate(&EvalContext::background(), &named_input("foobar"))
        .unwrap();
    engine
        .evaluate(&EvalContext::background(), &named_input("barfoo"))
        .unwrap();

    let version_after = engine.current_version().unwrap();
    assert_eq!(version_before, version_after);
}

#[test]
fn test_evaluation_failure_does_not_poison_the_handle() {
    let (engine, _file) = engine_from_policy(ALLOW_FOOBAR_POLICY);

    let ctx = EvalContext::background();
    ctx.cancel_handle().cancel();
    let err = engine.evaluate(&ctx, &named_input("foobar")).unwrap_err();
    assert!(err.is_eval_error());

    let result = engine
        .evaluate(&EvalContext::background(), &named_input("foobar"))
        .unwrap();
    assert!(result.allowed());
}

#[test]
fn test_result_set_shape() {
    let (engine, _file) = engine_from_policy(ALLOW_FOOBAR_POLICY);
    let result = engine
        .evaluate(&EvalContext::background(), &named_input("foobar"))
        .unwrap();
    insta::assert_json_snapshot!(result, @r#"
    {
      "results": [
        {
          "values": [
            true
          ]
        }
      ]
    }
    "#);
}
