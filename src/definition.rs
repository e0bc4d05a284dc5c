//! Explicit fixture and test-method definitions.
//!
//! A [`FixtureDefinition`] describes what a test framework would otherwise
//! discover by reflection: the fixture's full name, its constructors with
//! their parameter types, its test methods and the [`DependantConfig`]s
//! declared on it and inherited from its ancestors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::dependant::DependantConfig;
use crate::key::{method_path, signature_of, TypeKey};
use crate::pipeline::{HappyPath, Pipeline};
use crate::registration::AnyArc;

#[cfg(feature = "async")]
use crate::pipeline::{AsyncHappyPath, AsyncPipeline};

/// Builds a `Vec<TypeKey>` from a list of types.
///
/// ```rust
/// use ferrous_fixtures::{type_keys, TypeKey};
///
/// struct Ping;
/// assert_eq!(type_keys![Ping, u8], vec![TypeKey::of::<Ping>(), TypeKey::of::<u8>()]);
/// ```
#[macro_export]
macro_rules! type_keys {
    () => {
        ::std::vec::Vec::<$crate::TypeKey>::new()
    };
    ($($ty:ty),+ $(,)?) => {
        ::std::vec![$($crate::TypeKey::of::<$ty>()),+]
    };
}

/// An instantiated fixture, type-erased.
pub type FixtureInstance = Arc<dyn Any + Send + Sync>;

type ConstructFn = Arc<dyn Fn(&Arguments) -> anyhow::Result<FixtureInstance> + Send + Sync>;
type RunFn = Arc<dyn Fn(&FixtureInstance, &Arguments) -> anyhow::Result<()> + Send + Sync>;

/// One resolved argument.
#[derive(Clone)]
pub struct Argument {
    key: TypeKey,
    value: AnyArc,
}

impl Argument {
    pub(crate) fn new(key: TypeKey, value: AnyArc) -> Self {
        Self { key, value }
    }

    /// Declared type of the parameter this argument was resolved for.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn value(&self) -> &AnyArc {
        &self.value
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Argument").field(&self.key.name()).finish()
    }
}

/// Ordered arguments resolved for a constructor or test method.
///
/// Parameters whose type was never declared are left out, so positions can
/// shift. Prefer the typed lookups ([`first`](Self::first), [`all`](Self::all))
/// over positional access when a parameter may be missing.
#[derive(Clone, Default, Debug)]
pub struct Arguments {
    items: SmallVec<[Argument; 4]>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, argument: Argument) {
        self.items.push(argument);
    }

    /// The argument at `index`, if it exists and has type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.items.get(index).and_then(Argument::downcast::<T>)
    }

    /// The first argument of type `T`.
    pub fn first<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.items.iter().find_map(Argument::downcast::<T>)
    }

    /// The first argument of type `T`, or an error naming the missing type.
    pub fn require<T: Send + Sync + 'static>(&self) -> anyhow::Result<Arc<T>> {
        self.first::<T>()
            .ok_or_else(|| anyhow::anyhow!("no argument of type {} was injected", std::any::type_name::<T>()))
    }

    /// Every argument of type `T`, in order.
    pub fn all<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.items.iter().filter_map(Argument::downcast::<T>).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.items.iter()
    }

    /// Parameter types of the arguments actually present.
    pub fn keys(&self) -> Vec<TypeKey> {
        self.items.iter().map(Argument::key).collect()
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Argument;
    type IntoIter = std::slice::Iter<'a, Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A fixture constructor: parameter types and the function building the fixture.
#[derive(Clone)]
pub struct ConstructorDefinition {
    parameters: Vec<TypeKey>,
    construct: ConstructFn,
}

impl ConstructorDefinition {
    /// ```rust
    /// use ferrous_fixtures::{type_keys, ConstructorDefinition};
    /// use std::sync::Arc;
    ///
    /// struct Database;
    /// struct RepositoryTests { db: Arc<Database> }
    ///
    /// let ctor = ConstructorDefinition::new(type_keys![Database], |args| {
    ///     Ok(RepositoryTests { db: args.require::<Database>()? })
    /// });
    /// assert_eq!(ctor.parameters().len(), 1);
    /// ```
    pub fn new<Fx, F>(parameters: Vec<TypeKey>, construct: F) -> Self
    where
        Fx: Send + Sync + 'static,
        F: Fn(&Arguments) -> anyhow::Result<Fx> + Send + Sync + 'static,
    {
        Self {
            parameters,
            construct: Arc::new(move |args| Ok(Arc::new(construct(args)?) as FixtureInstance)),
        }
    }

    /// Parameterless constructor for fixtures implementing `Default`.
    pub fn default_of<Fx: Default + Send + Sync + 'static>() -> Self {
        Self::new(Vec::new(), |_| Ok(Fx::default()))
    }

    pub fn parameters(&self) -> &[TypeKey] {
        &self.parameters
    }

    pub(crate) fn construct(&self, args: &Arguments) -> anyhow::Result<FixtureInstance> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ConstructorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDefinition")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A test method of a fixture.
#[derive(Clone)]
pub struct TestMethodDefinition {
    name: String,
    parameters: Vec<TypeKey>,
    run: RunFn,
    config: Option<DependantConfig>,
    inherited: Vec<DependantConfig>,
}

impl TestMethodDefinition {
    /// Defines a test method on fixtures of type `Fx`.
    ///
    /// The body receives the fixture instance and the resolved arguments.
    pub fn new<Fx, F>(name: impl Into<String>, parameters: Vec<TypeKey>, body: F) -> Self
    where
        Fx: Send + Sync + 'static,
        F: Fn(&Fx, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let run: RunFn = Arc::new(move |fixture, args| {
            let fixture = fixture.downcast_ref::<Fx>().ok_or_else(|| {
                anyhow::anyhow!("test method expects a {} fixture", std::any::type_name::<Fx>())
            })?;
            body(fixture, args)
        });

        Self {
            name: name.into(),
            parameters,
            run,
            config: None,
            inherited: Vec::new(),
        }
    }

    /// Attaches this method's own configuration.
    pub fn dependant(mut self, config: DependantConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds the configuration of an overridden base method, nearest first.
    pub fn inherits(mut self, config: DependantConfig) -> Self {
        self.inherited.push(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[TypeKey] {
        &self.parameters
    }

    /// The method's configuration merged with the ones it inherits, or `None`
    /// when neither the method nor an overridden base method declares one.
    pub fn effective_config(&self) -> Option<DependantConfig> {
        if self.config.is_none() && self.inherited.is_empty() {
            return None;
        }
        let own = self.config.clone().unwrap_or_default();
        Some(own.merged_with(&self.inherited))
    }

    /// Scope key of this method on the fixture called `fixture_name`.
    pub fn signature(&self, fixture_name: &str) -> String {
        signature_of(&method_path(fixture_name, &self.name), &self.parameters)
    }

    /// Replaces own and inherited configuration with their merge.
    pub(crate) fn flattened(mut self) -> Self {
        self.config = self.effective_config();
        self.inherited.clear();
        self
    }

    pub(crate) fn run(&self, fixture: &FixtureInstance, args: &Arguments) -> anyhow::Result<()> {
        (self.run)(fixture, args)
    }
}

impl fmt::Debug for TestMethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethodDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A test fixture: name, constructors, test methods and configuration.
///
/// ```rust
/// use ferrous_fixtures::{type_keys, ConstructorDefinition, FixtureDefinition, TestMethodDefinition};
/// use std::sync::Arc;
///
/// struct EmptyDependency;
/// struct InjectTests { dependency: Arc<EmptyDependency> }
///
/// let fixture = FixtureDefinition::of::<InjectTests>()
///     .constructor(ConstructorDefinition::new(type_keys![EmptyDependency], |args| {
///         Ok(InjectTests { dependency: args.require::<EmptyDependency>()? })
///     }))
///     .test(TestMethodDefinition::new::<InjectTests, _>("injects_constructor", vec![], |fx, _| {
///         let _ = &fx.dependency;
///         Ok(())
///     }));
///
/// assert!(fixture.name().ends_with("InjectTests"));
/// assert_eq!(fixture.tests().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct FixtureDefinition {
    name: String,
    constructors: Vec<ConstructorDefinition>,
    tests: Vec<TestMethodDefinition>,
    config: Option<DependantConfig>,
    ancestors: Vec<DependantConfig>,
}

impl FixtureDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
            tests: Vec::new(),
            config: None,
            ancestors: Vec::new(),
        }
    }

    /// Definition named after the fixture type.
    pub fn of<Fx: ?Sized + 'static>() -> Self {
        Self::new(std::any::type_name::<Fx>())
    }

    /// Pipeline fixture for `P`, with a `happy_path` test.
    ///
    /// The fixture instance is a [`Pipeline<P>`] built from the resolved
    /// constructor arguments. Declare the same pipeline in a catalog with
    /// [`add_pipeline`](crate::DependencyCatalog::add_pipeline) to inject it
    /// into downstream fixtures.
    pub fn pipeline<P, F>(parameters: Vec<TypeKey>, construct: F) -> Self
    where
        P: HappyPath,
        F: Fn(&Arguments) -> anyhow::Result<P> + Send + Sync + 'static,
    {
        Self::of::<P>()
            .constructor(ConstructorDefinition::new(parameters, move |args| {
                Ok(Pipeline::new(construct(args)?))
            }))
            .test(TestMethodDefinition::new::<Pipeline<P>, _>(
                "happy_path",
                Vec::new(),
                |pipeline, _| pipeline.happy_path(),
            ))
    }

    /// Asynchronous counterpart of [`pipeline`](Self::pipeline).
    #[cfg(feature = "async")]
    pub fn async_pipeline<P, F>(parameters: Vec<TypeKey>, construct: F) -> Self
    where
        P: AsyncHappyPath,
        F: Fn(&Arguments) -> anyhow::Result<P> + Send + Sync + 'static,
    {
        Self::of::<P>()
            .constructor(ConstructorDefinition::new(parameters, move |args| {
                Ok(AsyncPipeline::new(construct(args)?))
            }))
            .test(TestMethodDefinition::new::<AsyncPipeline<P>, _>(
                "happy_path",
                Vec::new(),
                |pipeline, _| pipeline.happy_path(),
            ))
    }

    pub fn constructor(mut self, constructor: ConstructorDefinition) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn test(mut self, test: TestMethodDefinition) -> Self {
        self.tests.push(test);
        self
    }

    /// Attaches the fixture's own configuration.
    pub fn dependant(mut self, config: DependantConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Records `parent` as the direct ancestor of this fixture.
    ///
    /// Only configuration is inherited; test methods stay with the type that
    /// defines them.
    pub fn extends(mut self, parent: &FixtureDefinition) -> Self {
        let mut ancestors = Vec::with_capacity(parent.ancestors.len() + 1);
        ancestors.push(parent.config.clone().unwrap_or_default());
        ancestors.extend(parent.ancestors.iter().cloned());
        self.ancestors = ancestors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructors(&self) -> &[ConstructorDefinition] {
        &self.constructors
    }

    pub fn tests(&self) -> &[TestMethodDefinition] {
        &self.tests
    }

    /// Test methods called `name`, overloads included.
    pub fn tests_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TestMethodDefinition> + 'a {
        self.tests.iter().filter(move |t| t.name == name)
    }

    /// Own configuration merged with every ancestor's.
    pub fn effective_config(&self) -> DependantConfig {
        self.config.clone().unwrap_or_default().merged_with(&self.ancestors)
    }

    /// Merges inherited configuration into the definition, fixture and
    /// methods alike, so later builds do not merge again.
    pub(crate) fn flattened(mut self) -> Self {
        self.config = Some(self.effective_config());
        self.ancestors.clear();
        self.tests = self.tests.into_iter().map(TestMethodDefinition::flattened).collect();
        self
    }

    /// Scope key of the fixture built from `constructor`.
    pub fn signature(&self, constructor: &ConstructorDefinition) -> String {
        signature_of(&self.name, &constructor.parameters)
    }
}
