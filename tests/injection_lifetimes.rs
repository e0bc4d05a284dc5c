use ferrous_fixtures::{
    type_keys, ConstructorDefinition, DependencyCatalog, FixtureDefinition, Lifetime, Resolver, TestOutcome,
    TestSession, TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct EmptyDependency;

struct Clock;

#[derive(Debug)]
struct RequestId(usize);

struct LifetimeTests;

fn session() -> TestSession {
    let ids = Arc::new(AtomicUsize::new(0));
    let mut catalog = DependencyCatalog::new("lifetimes");
    catalog
        .add_scoped_factory::<EmptyDependency, _>(|_| EmptyDependency)
        .add_singleton(Clock)
        .add_transient_factory::<RequestId, _>(move |_| RequestId(ids.fetch_add(1, Ordering::SeqCst)));
    TestSession::new(catalog)
}

fn fixture(parameters: Vec<TypeKey>) -> FixtureDefinition {
    FixtureDefinition::of::<LifetimeTests>()
        .constructor(ConstructorDefinition::new(parameters, |_| Ok(LifetimeTests)))
}

#[test]
fn test_singleton_shared_across_fixture_scopes() {
    let session = session();
    let scopes = session.scopes().unwrap();

    let a = scopes.fixture("tests::A", "tests::A").get_required::<Clock>();
    let b = scopes.fixture("tests::B", "tests::B").get_required::<Clock>();
    let c = scopes
        .fixture("tests::B", "tests::B")
        .test("tests::B::run", "tests::B::run")
        .unwrap()
        .get_required::<Clock>();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
}

#[test]
fn test_transient_is_fresh_on_every_resolution() {
    let session = session();
    let scope = session.scopes().unwrap().fixture("tests::A", "tests::A");

    let first = scope.get_required::<RequestId>();
    let second = scope.get_required::<RequestId>();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.0, second.0);
}

#[test]
fn test_scoped_dependency_shared_by_constructor_parameters() {
    let session = session();
    let definition = fixture(type_keys![EmptyDependency, EmptyDependency]);

    let built = session.injector().unwrap().build_fixtures(&definition).unwrap();
    assert_eq!(built.len(), 1);
    assert_eq!(built[0].outcome(), &TestOutcome::Runnable);

    let arguments = built[0].arguments().all::<EmptyDependency>();
    assert_eq!(arguments.len(), 2);
    assert!(Arc::ptr_eq(&arguments[0], &arguments[1]));

    // Fixture-level lookups share the constructor's instance.
    let looked_up = built[0].scope().get_required::<EmptyDependency>();
    assert!(Arc::ptr_eq(&arguments[0], &looked_up));
}

#[test]
fn test_scoped_dependency_differs_between_fixture_scopes() {
    let session = session();
    let definition = FixtureDefinition::of::<LifetimeTests>()
        .constructor(ConstructorDefinition::new(type_keys![EmptyDependency], |_| Ok(LifetimeTests)))
        .constructor(ConstructorDefinition::new(type_keys![EmptyDependency, Clock], |_| Ok(LifetimeTests)));

    let built = session.injector().unwrap().build_fixtures(&definition).unwrap();
    assert_eq!(built.len(), 2);
    assert_ne!(built[0].signature(), built[1].signature());

    let first = built[0].arguments().require::<EmptyDependency>().unwrap();
    let second = built[1].arguments().require::<EmptyDependency>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    // The singleton is the same in both.
    let clock = built[1].arguments().require::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&clock, &session.scopes().unwrap().fixture("x", "x").get_required::<Clock>()));
}

#[test]
fn test_rebuilding_a_fixture_reuses_its_scope() {
    let session = session();
    let definition = fixture(type_keys![EmptyDependency]);
    let injector = session.injector().unwrap();

    let first = injector.build_fixtures(&definition).unwrap().remove(0);
    let second = injector.build_fixtures(&definition).unwrap().remove(0);

    assert!(Arc::ptr_eq(first.scope(), second.scope()));
    assert!(Arc::ptr_eq(
        &first.arguments().require::<EmptyDependency>().unwrap(),
        &second.arguments().require::<EmptyDependency>().unwrap()
    ));
}

#[test]
fn test_undeclared_parameters_are_omitted() {
    let session = session();
    let definition = fixture(type_keys![u64, EmptyDependency, String]);

    let built = session.injector().unwrap().build_fixtures(&definition).unwrap();
    let arguments = built[0].arguments();

    assert_eq!(arguments.len(), 1);
    assert_eq!(arguments.keys(), type_keys![EmptyDependency]);
    assert!(arguments.get::<EmptyDependency>(0).is_some());
    assert!(arguments.first::<u64>().is_none());
    assert!(arguments.require::<String>().is_err());
    assert_eq!(built[0].outcome(), &TestOutcome::Runnable);
    // The signature keeps every declared parameter type.
    assert!(built[0].signature().contains("u64"));
}

#[test]
fn test_signature_without_parameters_has_no_parentheses() {
    let session = session();
    let built = session
        .injector()
        .unwrap()
        .build_fixtures(&fixture(Vec::new()))
        .unwrap();

    assert_eq!(built[0].signature(), std::any::type_name::<LifetimeTests>());
    assert!(built[0].arguments().is_empty());
}

#[test]
fn test_declared_lifetimes_are_queryable() {
    let session = session();
    let registry = session.registry().unwrap();

    assert_eq!(registry.lifetime_of(&TypeKey::of::<EmptyDependency>()), Some(Lifetime::Scoped));
    assert_eq!(registry.lifetime_of(&TypeKey::of::<Clock>()), Some(Lifetime::Singleton));
    assert_eq!(registry.lifetime_of(&TypeKey::of::<RequestId>()), Some(Lifetime::Transient));
    assert_eq!(registry.lifetime_of(&TypeKey::of::<u64>()), None);

    let names: Vec<&str> = registry.descriptors().iter().map(|d| d.type_name()).collect();
    assert_eq!(names.len(), 3);
    assert!(names[0].ends_with("EmptyDependency"));
}

#[test]
fn test_singletons_from_several_catalogs() {
    let mut first = DependencyCatalog::new("first");
    first.add_singleton(Clock);
    let mut second = DependencyCatalog::new("second");
    second.add_scoped_factory::<EmptyDependency, _>(|_| EmptyDependency);

    let session = TestSession::builder().catalog(first).catalog(second).build();
    let scope = session.scopes().unwrap().fixture("tests::A", "tests::A");

    assert!(scope.get::<Clock>().unwrap().is_some());
    assert!(scope.get::<EmptyDependency>().unwrap().is_some());
    assert_eq!(session.registry().unwrap().len(), 2);
}
