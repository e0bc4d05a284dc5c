use ferrous_fixtures::{
    type_keys, ConstructorDefinition, DependencyCatalog, DiError, FixtureDefinition, Resolver, SessionOptions,
    TestMethodDefinition, TestResult, TestSession,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

struct Left(#[allow(dead_code)] Arc<Right>);
struct Right(#[allow(dead_code)] Arc<Left>);

struct First(#[allow(dead_code)] Arc<Second>);
struct Second(#[allow(dead_code)] Arc<Third>);
struct Third;

struct ErrorTests;

fn panic_text(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_default()
}

#[test]
fn test_duplicate_declaration_fails_the_session() {
    let mut catalog = DependencyCatalog::new("duplicates");
    catalog.add_singleton(Third).add_scoped_factory::<Third, _>(|_| Third);
    let session = TestSession::new(catalog);

    assert!(matches!(session.registry(), Err(DiError::DuplicateDeclaration(name)) if name.ends_with("Third")));
    // A failed build is reported again, never half-cached.
    assert!(session.scopes().is_err());
    assert!(session.injector().is_err());
}

#[test]
fn test_circular_factories_are_reported_with_path() {
    let mut catalog = DependencyCatalog::new("cycle");
    catalog
        .add_scoped_factory::<Left, _>(|r| Left(r.get_required::<Right>()))
        .add_scoped_factory::<Right, _>(|r| Right(r.get_required::<Left>()));
    let session = TestSession::new(catalog);
    let scope = session.scopes().unwrap().fixture("tests::Cycle", "tests::Cycle");

    let payload = catch_unwind(AssertUnwindSafe(|| scope.get_required::<Left>())).err().unwrap();
    let message = panic_text(payload);
    assert!(message.contains("Circular dependency"), "{message}");
    assert!(message.contains("Left -> "), "{message}");

    // The resolution stack is clean again afterwards.
    let right = catch_unwind(AssertUnwindSafe(|| scope.get_required::<Right>())).err().unwrap();
    assert!(panic_text(right).contains("Circular dependency"));
}

#[test]
fn test_circular_factories_fail_the_runner_build() {
    let mut catalog = DependencyCatalog::new("cycle");
    catalog
        .add_scoped_factory::<Left, _>(|r| Left(r.get_required::<Right>()))
        .add_scoped_factory::<Right, _>(|r| Right(r.get_required::<Left>()));
    let session = TestSession::new(catalog);
    session.register_fixture(
        FixtureDefinition::of::<ErrorTests>()
            .constructor(ConstructorDefinition::new(type_keys![Left], |_| Ok(ErrorTests)))
            .test(TestMethodDefinition::new::<ErrorTests, _>("never_runs", vec![], |_, _| Ok(()))),
    );

    let reports = session.runner().run(std::any::type_name::<ErrorTests>()).unwrap();
    assert!(matches!(&reports[0].setup, TestResult::Failed(m) if m.contains("Circular dependency")));
    assert!(matches!(reports[0].result_of("never_runs"), Some(TestResult::Failed(_))));
}

#[test]
fn test_depth_limit_from_options() {
    let mut catalog = DependencyCatalog::new("deep");
    catalog
        .add_transient_factory::<First, _>(|r| First(r.get_required::<Second>()))
        .add_transient_factory::<Second, _>(|r| Second(r.get_required::<Third>()))
        .add_transient_factory::<Third, _>(|_| Third);

    let shallow = TestSession::builder()
        .catalog(catalog.clone())
        .options(SessionOptions {
            max_resolution_depth: 2,
            ..SessionOptions::default()
        })
        .build();
    let scope = shallow.scopes().unwrap().fixture("tests::Deep", "tests::Deep");
    let payload = catch_unwind(AssertUnwindSafe(|| scope.get_required::<First>())).err().unwrap();
    assert!(panic_text(payload).contains("Max depth 2 exceeded"));

    let deep = TestSession::new(catalog);
    let scope = deep.scopes().unwrap().fixture("tests::Deep", "tests::Deep");
    assert!(scope.get::<First>().unwrap().is_some());
}

#[test]
fn test_try_get_required_names_missing_type() {
    let session = TestSession::new(DependencyCatalog::new("empty"));
    let scope = session.scopes().unwrap().fixture("tests::Empty", "tests::Empty");

    match scope.try_get_required::<Third>() {
        Err(DiError::NotDeclared(name)) => assert!(name.ends_with("Third")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("resolved an undeclared type"),
    }
}

#[test]
fn test_disposed_scope_rejects_resolution() {
    let mut catalog = DependencyCatalog::new("disposed");
    catalog.add_scoped_factory::<Third, _>(|_| Third);
    let session = TestSession::new(catalog);
    let scope = session.scopes().unwrap().fixture("tests::Gone", "tests::Gone");

    scope.dispose();
    assert!(matches!(scope.get::<Third>(), Err(DiError::ScopeDisposed(label)) if label == "tests::Gone"));
}

#[test]
fn test_unknown_fixture_is_an_error() {
    let session = TestSession::new(DependencyCatalog::new("empty"));
    let err = session.runner().run("tests::Missing").unwrap_err();
    assert_eq!(err.to_string(), "Fixture not registered: tests::Missing");
}

#[test]
fn test_constructor_and_test_failures_are_reported() {
    struct Fragile;

    let session = TestSession::new(DependencyCatalog::new("fragile"));
    session.register_fixture(
        FixtureDefinition::of::<Fragile>()
            .constructor(ConstructorDefinition::new(vec![], |_| Ok(Fragile)))
            .constructor(ConstructorDefinition::new(type_keys![u8], |_| -> anyhow::Result<Fragile> {
                anyhow::bail!("database unreachable")
            }))
            .test(TestMethodDefinition::new::<Fragile, _>("fails", vec![], |_, _| {
                anyhow::bail!("assertion failed: expected 1")
            }))
            .test(TestMethodDefinition::new::<Fragile, _>("panics", vec![], |_, _| {
                panic!("index out of bounds")
            })),
    );

    let reports = session.runner().run(std::any::type_name::<Fragile>()).unwrap();
    assert_eq!(reports.len(), 2);

    let healthy = &reports[0];
    assert!(healthy.setup.is_passed());
    assert_eq!(
        healthy.result_of("fails"),
        Some(&TestResult::Failed("assertion failed: expected 1".into()))
    );
    assert!(matches!(healthy.result_of("panics"), Some(TestResult::Failed(m)) if m.contains("index out of bounds")));

    let broken = &reports[1];
    assert!(matches!(&broken.setup, TestResult::Failed(m) if m.contains("database unreachable")));
    assert_eq!(broken.count(|r| matches!(r, TestResult::Failed(_))), 2);
}
