use ferrous_fixtures::{
    type_keys, ConstructorDefinition, DependencyCatalog, DiError, Dispose, FixtureDefinition, LifecycleEvent, MetricsObserver,
    Resolver, TestEventListener, TestMethodDefinition, TestSession, TracingObserver,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Records the order in which disposers ran.
#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct Connection {
    label: String,
    journal: Arc<Journal>,
}

impl Dispose for Connection {
    fn dispose(&self) {
        self.journal.0.lock().push(self.label.clone());
    }
}

struct LifecycleTests;

const CLASS: &str = "tests::LifecycleTests";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session(journal: &Arc<Journal>, metrics: &Arc<MetricsObserver>) -> TestSession {
    let journal = journal.clone();
    let opened = AtomicUsize::new(0);
    let mut catalog = DependencyCatalog::new("lifecycle");
    catalog.add_scoped_factory::<Connection, _>(move |r| {
        let label = format!("conn-{}", opened.fetch_add(1, Ordering::SeqCst));
        r.register_disposer(Arc::new(Connection {
            label: label.clone(),
            journal: journal.clone(),
        }));
        Connection {
            label,
            journal: journal.clone(),
        }
    });

    TestSession::builder()
        .catalog(catalog)
        .add_observer(metrics.clone())
        .add_observer(Arc::new(TracingObserver::new()))
        .build()
}

fn definition() -> FixtureDefinition {
    FixtureDefinition::new(CLASS)
        .constructor(ConstructorDefinition::new(type_keys![Connection], |_| Ok(LifecycleTests)))
        .test(TestMethodDefinition::new::<LifecycleTests, _>("query", type_keys![Connection], |_, _| Ok(())))
        .test(TestMethodDefinition::new::<LifecycleTests, _>("query", type_keys![Connection, u8], |_, _| Ok(())))
        .test(TestMethodDefinition::new::<LifecycleTests, _>("insert", type_keys![Connection], |_, _| Ok(())))
}

/// Builds the fixture and every test so that each scope holds a connection.
fn build_all(session: &TestSession) {
    let definition = session.register_fixture(definition());
    let injector = session.injector().unwrap();
    let fixture = injector.build_fixtures(&definition).unwrap().remove(0);
    for method in definition.tests() {
        injector.build_test(&fixture, method).unwrap();
    }
}

#[test]
fn test_case_finished_disposes_exactly_one_overload() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);

    let fixture = session.scopes().unwrap().fixtures_of(CLASS).remove(0);
    let signature = format!("{CLASS}::query({})", std::any::type_name::<Connection>());
    let target = fixture.get_test(&signature).unwrap().get_required::<Connection>();

    let bridge = session.bridge();
    let event = LifecycleEvent::case_finished_with(CLASS, "query", &type_keys![Connection]);
    assert_eq!(bridge.handle(&event), 1);

    assert_eq!(fixture.test_keys().len(), 2);
    assert!(fixture.get_test(&signature).is_none());
    assert_eq!(journal.entries(), vec![target.label.clone()]);

    // A second notification for the same case finds nothing to dispose.
    assert_eq!(bridge.handle(&event), 0);
}

#[test]
fn test_case_finished_without_parameters_covers_all_overloads() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);

    assert_eq!(session.bridge().handle(&LifecycleEvent::case_finished(CLASS, "query")), 2);

    let fixture = session.scopes().unwrap().fixtures_of(CLASS).remove(0);
    assert_eq!(fixture.test_keys().len(), 1);
    assert!(fixture.test_keys()[0].contains("::insert"));
}

#[test]
fn test_suite_finished_disposes_fixture_then_children() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);
    let fixture = session.scopes().unwrap().fixtures_of(CLASS).remove(0);
    let own = fixture.get_required::<Connection>();

    assert_eq!(session.bridge().handle(&LifecycleEvent::suite_finished(CLASS)), 1);

    let entries = journal.entries();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0], own.label);
    assert!(!entries[1..].contains(&own.label));
    assert!(fixture.is_disposed());
    assert!(session.scopes().unwrap().is_empty());
    assert_eq!(metrics.scopes_created(), 4);
    assert_eq!(metrics.scopes_disposed(), 4);
}

#[test]
fn test_events_in_any_order_are_harmless() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);

    let bridge = session.bridge();
    let disposed = bridge.listen([
        LifecycleEvent::suite_finished(CLASS),
        LifecycleEvent::case_finished(CLASS, "query"),
        LifecycleEvent::suite_finished(CLASS),
        LifecycleEvent::suite_finished("tests::NeverSeen"),
        LifecycleEvent::case_finished("tests::NeverSeen", "query"),
    ]);

    assert_eq!(disposed, 1);
    assert_eq!(journal.entries().len(), 4);
}

#[test]
fn test_scope_recreated_after_disposal_is_fresh() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);

    let before = session.scopes().unwrap().fixtures_of(CLASS).remove(0);
    let old = before.get_required::<Connection>();
    session.bridge().on_test_event(&LifecycleEvent::suite_finished(CLASS));

    let after = session.scopes().unwrap().fixture(CLASS, before.key());
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(!Arc::ptr_eq(&old, &after.get_required::<Connection>()));
}

#[test]
fn test_runner_leaves_no_scopes_behind() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    session.register_fixture(definition());

    let reports = session.runner().run(CLASS).unwrap();
    assert!(reports[0].all_passed(), "{:?}", reports[0]);
    assert!(session.scopes().unwrap().is_empty());
    assert_eq!(journal.entries().len(), 4);
}

#[test]
fn test_building_a_test_after_suite_finished_fails() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    let definition = session.register_fixture(definition());
    let injector = session.injector().unwrap();
    let fixture = injector.build_fixtures(&definition).unwrap().remove(0);

    assert_eq!(session.bridge().handle(&LifecycleEvent::suite_finished(CLASS)), 1);
    assert_eq!(journal.entries().len(), 1);

    let late = injector.build_test(&fixture, &definition.tests()[0]);
    assert!(matches!(late, Err(DiError::ScopeDisposed(label)) if label == fixture.signature()));
    assert!(fixture.scope().test_keys().is_empty());

    // Nothing was left behind for the session to find.
    session.dispose();
    assert_eq!(journal.entries().len(), 1);
    assert_eq!(metrics.scopes_created(), 1);
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_bridge_consumes_events_from_a_channel() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let metrics = Arc::new(MetricsObserver::new());
    let session = session(&journal, &metrics);
    build_all(&session);

    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
    let task = session.bridge().spawn(receiver);

    let producer = std::thread::spawn(move || {
        sender.send(LifecycleEvent::case_finished(CLASS, "insert")).unwrap();
        sender.send(LifecycleEvent::suite_finished(CLASS)).unwrap();
    });
    producer.join().unwrap();

    assert_eq!(task.await.unwrap(), 2);
    assert!(session.scopes().unwrap().is_empty());
}
