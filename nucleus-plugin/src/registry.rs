use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::context::{PluginContext, PluginLogger};
use crate::error::{KernelError, Result};
use crate::hook::HookHandler;
use crate::kernel::PluginKernel;

/// A resolved service instance. Callers downcast to the concrete type.
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

/// Constructs a service instance against the installed plugin context.
pub type ServiceFactory =
    Arc<dyn Fn(Arc<dyn PluginContext>) -> BoxFuture<'static, Result<ServiceHandle>> + Send + Sync>;

/// Downcast a service handle to its concrete type.
pub fn downcast_service<T: Send + Sync + 'static>(handle: &ServiceHandle) -> Option<Arc<T>> {
    Arc::clone(handle).downcast::<T>().ok()
}

/// How long a constructed instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLifecycle {
    /// Constructed once, cached for the registry's lifetime.
    Singleton,
    /// A fresh instance on every resolution, never cached.
    Transient,
    /// Cached per caller-supplied scope id until the scope is cleared.
    Scoped,
}

/// A factory registration. Declared dependencies feed cycle detection only;
/// nothing is injected automatically.
#[derive(Clone)]
pub struct ServiceRegistration {
    pub name: String,
    pub lifecycle: ServiceLifecycle,
    pub dependencies: Vec<String>,
    pub factory: ServiceFactory,
}

impl ServiceRegistration {
    pub fn new<F, Fut>(name: impl Into<String>, lifecycle: ServiceLifecycle, factory: F) -> Self
    where
        F: Fn(Arc<dyn PluginContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ServiceHandle>> + Send + 'static,
    {
        Self {
            name: name.into(),
            lifecycle,
            dependencies: Vec::new(),
            factory: Arc::new(move |context| -> BoxFuture<'static, Result<ServiceHandle>> {
                Box::pin(factory(context))
            }),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryState {
    factories: HashMap<String, ServiceRegistration>,
    instances: HashMap<String, ServiceHandle>,
    singletons: HashMap<String, ServiceHandle>,
    scoped: HashMap<String, HashMap<String, ServiceHandle>>,
    singleton_gates: HashMap<String, Arc<AsyncMutex<()>>>,
    scope_gates: HashMap<String, Arc<AsyncMutex<()>>>,
}

/// Named service registry: factories with lifecycles plus statically
/// registered instances. All state is instance state; the registry is
/// shared by `Arc` rather than through globals.
pub struct ServiceRegistry {
    state: Mutex<RegistryState>,
    context: Mutex<Option<Weak<dyn PluginContext>>>,
    self_ref: Weak<ServiceRegistry>,
}

impl ServiceRegistry {
    /// Registries are always shared; construction hands back an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(RegistryState::default()),
            context: Mutex::new(None),
            self_ref: weak.clone(),
        })
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the context handed to factories. Must happen before the
    /// first factory runs.
    pub fn install_context(&self, context: &Arc<dyn PluginContext>) {
        let mut slot = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::downgrade(context));
    }

    fn context(&self) -> Result<Arc<dyn PluginContext>> {
        let slot = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            None => Err(KernelError::Configuration(
                "no plugin context installed; install_context must run before services are resolved"
                    .into(),
            )),
            Some(weak) => weak.upgrade().ok_or_else(|| {
                KernelError::Configuration("the installed plugin context has been dropped".into())
            }),
        }
    }

    /// Register a service factory. Strict: an existing factory or static
    /// instance under the same name is never overwritten.
    pub fn register_factory(&self, registration: ServiceRegistration) -> Result<()> {
        let mut state = self.state();
        let name = registration.name.clone();
        if state.factories.contains_key(&name) || state.instances.contains_key(&name) {
            return Err(KernelError::AlreadyRegistered(format!("service '{name}'")));
        }
        state.factories.insert(name, registration);
        Ok(())
    }

    /// Register a ready-made instance under a unique name.
    pub fn register_instance(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        let mut state = self.state();
        if state.factories.contains_key(name) || state.instances.contains_key(name) {
            return Err(KernelError::AlreadyRegistered(format!("service '{name}'")));
        }
        state.instances.insert(name.to_string(), instance);
        Ok(())
    }

    /// Swap a static instance, installing it if absent. Access control for
    /// this is the permission enforcer's job, not the registry's.
    pub fn replace_instance(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.state().instances.insert(name.to_string(), instance);
        Ok(())
    }

    /// Snapshot of the statically registered instances.
    pub fn services(&self) -> HashMap<String, ServiceHandle> {
        self.state().instances.clone()
    }

    /// Resolve a service by name. Scoped services require `scope`.
    pub async fn get_service(&self, name: &str, scope: Option<&str>) -> Result<ServiceHandle> {
        self.resolve(name, scope, &[]).await
    }

    /// Resolution carrying the construction path. Factories re-enter
    /// through a `ResolvingContext` that threads `path`, so a cycle is
    /// caught here without confusing unrelated concurrent callers.
    async fn resolve(&self, name: &str, scope: Option<&str>, path: &[String]) -> Result<ServiceHandle> {
        if path.iter().any(|entry| entry == name) {
            let mut cycle = path.to_vec();
            cycle.push(name.to_string());
            return Err(KernelError::CircularDependency { path: cycle });
        }

        let registration = self.state().factories.get(name).cloned();
        let Some(registration) = registration else {
            return self
                .state()
                .instances
                .get(name)
                .cloned()
                .ok_or_else(|| KernelError::NotFound(format!("service '{name}'")));
        };

        match registration.lifecycle {
            ServiceLifecycle::Transient => self.construct(&registration, path).await,
            ServiceLifecycle::Singleton => self.resolve_singleton(name, &registration, path).await,
            ServiceLifecycle::Scoped => {
                let scope = scope.ok_or_else(|| KernelError::ScopeRequired(name.to_string()))?;
                self.resolve_scoped(name, scope, &registration, path).await
            }
        }
    }

    async fn resolve_singleton(
        &self,
        name: &str,
        registration: &ServiceRegistration,
        path: &[String],
    ) -> Result<ServiceHandle> {
        if let Some(existing) = self.state().singletons.get(name).cloned() {
            return Ok(existing);
        }
        // Concurrent first accesses serialize on a per-name gate; the
        // losers find the winner's instance in the cache. At most one
        // factory invocation per singleton.
        let gate = {
            let mut state = self.state();
            state
                .singleton_gates
                .entry(name.to_string())
                .or_default()
                .clone()
        };
        let _guard = gate.lock().await;
        if let Some(existing) = self.state().singletons.get(name).cloned() {
            return Ok(existing);
        }
        let instance = self.construct(registration, path).await?;
        self.state()
            .singletons
            .insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    async fn resolve_scoped(
        &self,
        name: &str,
        scope: &str,
        registration: &ServiceRegistration,
        path: &[String],
    ) -> Result<ServiceHandle> {
        let cached = self
            .state()
            .scoped
            .get(scope)
            .and_then(|submap| submap.get(name))
            .cloned();
        if let Some(existing) = cached {
            return Ok(existing);
        }
        // One gate per scope: construction and clear_scope for the same
        // scope id never interleave.
        let gate = {
            let mut state = self.state();
            state
                .scope_gates
                .entry(scope.to_string())
                .or_default()
                .clone()
        };
        let _guard = gate.lock().await;
        let cached = self
            .state()
            .scoped
            .get(scope)
            .and_then(|submap| submap.get(name))
            .cloned();
        if let Some(existing) = cached {
            return Ok(existing);
        }
        let instance = self.construct(registration, path).await?;
        self.state()
            .scoped
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    async fn construct(
        &self,
        registration: &ServiceRegistration,
        path: &[String],
    ) -> Result<ServiceHandle> {
        let base = self.context()?;
        let registry = self.self_ref.upgrade().ok_or_else(|| {
            KernelError::Configuration("the service registry has been dropped".into())
        })?;
        let mut child_path = path.to_vec();
        child_path.push(registration.name.clone());
        let context: Arc<dyn PluginContext> = Arc::new(ResolvingContext {
            registry,
            base,
            path: child_path,
        });
        (registration.factory)(context).await
    }

    /// Drop every cached instance for a scope. Serialized against in-flight
    /// construction within that scope.
    pub async fn clear_scope(&self, scope: &str) {
        let gate = {
            let mut state = self.state();
            state
                .scope_gates
                .entry(scope.to_string())
                .or_default()
                .clone()
        };
        let _guard = gate.lock().await;
        let mut state = self.state();
        state.scoped.remove(scope);
        state.scope_gates.remove(scope);
    }

    /// Diagnostic scan over the declared dependency lists of every
    /// registered factory. Returns each cycle as an ordered path with the
    /// entry node repeated at the end. Distinct from the reentrancy guard,
    /// which fires on actual construction.
    pub fn detect_circular_dependencies(&self) -> Vec<Vec<String>> {
        let graph: HashMap<String, Vec<String>> = self
            .state()
            .factories
            .iter()
            .map(|(name, registration)| (name.clone(), registration.dependencies.clone()))
            .collect();
        let mut roots: Vec<String> = graph.keys().cloned().collect();
        roots.sort();

        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for root in &roots {
            scan(root, &graph, &mut visited, &mut path, &mut cycles);
        }
        cycles
    }
}

fn scan(
    node: &str,
    graph: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    if let Some(position) = path.iter().position(|entry| entry == node) {
        let mut cycle = path[position..].to_vec();
        cycle.push(node.to_string());
        cycles.push(cycle);
        return;
    }
    if visited.contains(node) {
        return;
    }
    path.push(node.to_string());
    if let Some(dependencies) = graph.get(node) {
        for dependency in dependencies {
            scan(dependency, graph, visited, path, cycles);
        }
    }
    path.pop();
    visited.insert(node.to_string());
}

/// Context handed to an executing factory. Service access threads the
/// current construction path so transitive reentrancy surfaces as a
/// `CircularDependencyError`; everything else delegates to the installed
/// base context.
struct ResolvingContext {
    registry: Arc<ServiceRegistry>,
    base: Arc<dyn PluginContext>,
    path: Vec<String>,
}

#[async_trait]
impl PluginContext for ResolvingContext {
    fn register_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.base.register_service(name, instance)
    }

    fn replace_service(&self, name: &str, instance: ServiceHandle) -> Result<()> {
        self.base.replace_service(name, instance)
    }

    async fn get_service(&self, name: &str) -> Result<ServiceHandle> {
        self.registry.resolve(name, None, &self.path).await
    }

    fn get_services(&self) -> HashMap<String, ServiceHandle> {
        self.base.get_services()
    }

    fn hook(&self, name: &str, handler: HookHandler) {
        self.base.hook(name, handler);
    }

    async fn trigger(&self, name: &str, args: Value) -> Result<()> {
        self.base.trigger(name, args).await
    }

    fn logger(&self) -> PluginLogger {
        self.base.logger()
    }

    fn get_kernel(&self) -> Result<Arc<PluginKernel>> {
        self.base.get_kernel()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::KernelContext;
    use crate::hook::HookBus;

    fn installed_registry() -> (Arc<ServiceRegistry>, Arc<dyn PluginContext>) {
        let registry = ServiceRegistry::new();
        let context: Arc<dyn PluginContext> = Arc::new(KernelContext::new(
            registry.clone(),
            Arc::new(HookBus::new()),
            Weak::new(),
            "test",
        ));
        registry.install_context(&context);
        (registry, context)
    }

    fn counter_factory(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn(Arc<dyn PluginContext>) -> BoxFuture<'static, Result<ServiceHandle>>
    + Send
    + Sync
    + 'static {
        move |_context| -> BoxFuture<'static, Result<ServiceHandle>> {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let handle: ServiceHandle = Arc::new(AtomicUsize::new(0));
                Ok(handle)
            })
        }
    }

    #[tokio::test]
    async fn test_singleton_returns_identical_reference() {
        let (registry, _context) = installed_registry();
        let built = Arc::new(AtomicUsize::new(0));
        registry
            .register_factory(ServiceRegistration::new(
                "cache",
                ServiceLifecycle::Singleton,
                counter_factory(built.clone()),
            ))
            .unwrap();

        let first = registry.get_service("cache", None).await.unwrap();
        let second = registry.get_service("cache", None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_returns_distinct_instances() {
        let (registry, _context) = installed_registry();
        let built = Arc::new(AtomicUsize::new(0));
        registry
            .register_factory(ServiceRegistration::new(
                "request-id",
                ServiceLifecycle::Transient,
                counter_factory(built.clone()),
            ))
            .unwrap();

        let first = registry.get_service("request-id", None).await.unwrap();
        let second = registry.get_service("request-id", None).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 2);

        // Instances carry independent state.
        downcast_service::<AtomicUsize>(&first)
            .unwrap()
            .store(7, Ordering::SeqCst);
        assert_eq!(
            downcast_service::<AtomicUsize>(&second)
                .unwrap()
                .load(Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn test_scoped_caches_per_scope() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "session",
                ServiceLifecycle::Scoped,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap();

        let a1 = registry.get_service("session", Some("req-a")).await.unwrap();
        let a2 = registry.get_service("session", Some("req-a")).await.unwrap();
        let b = registry.get_service("session", Some("req-b")).await.unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[tokio::test]
    async fn test_scoped_without_scope_id_is_rejected() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "session",
                ServiceLifecycle::Scoped,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap();

        let err = registry.get_service("session", None).await.unwrap_err();
        assert!(matches!(err, KernelError::ScopeRequired(name) if name == "session"));
    }

    #[tokio::test]
    async fn test_clear_scope_invalidates_only_that_scope() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "session",
                ServiceLifecycle::Scoped,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap();

        let a = registry.get_service("session", Some("req-a")).await.unwrap();
        let b = registry.get_service("session", Some("req-b")).await.unwrap();
        registry.clear_scope("req-a").await;

        let a_again = registry.get_service("session", Some("req-a")).await.unwrap();
        let b_again = registry.get_service("session", Some("req-b")).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &a_again));
        assert!(Arc::ptr_eq(&b, &b_again));
    }

    #[tokio::test]
    async fn test_duplicate_factory_registration_is_rejected() {
        let (registry, _context) = installed_registry();
        let first_built = Arc::new(AtomicUsize::new(0));
        registry
            .register_factory(ServiceRegistration::new(
                "cache",
                ServiceLifecycle::Singleton,
                counter_factory(first_built.clone()),
            ))
            .unwrap();

        let err = registry
            .register_factory(ServiceRegistration::new(
                "cache",
                ServiceLifecycle::Transient,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap_err();
        assert!(matches!(err, KernelError::AlreadyRegistered(_)));

        // The original registration still resolves.
        registry.get_service("cache", None).await.unwrap();
        assert_eq!(first_built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_instance_fallback_and_not_found() {
        let (registry, _context) = installed_registry();
        let instance: ServiceHandle = Arc::new(AtomicUsize::new(42));
        registry.register_instance("config", instance).unwrap();

        let resolved = registry.get_service("config", None).await.unwrap();
        assert_eq!(
            downcast_service::<AtomicUsize>(&resolved)
                .unwrap()
                .load(Ordering::SeqCst),
            42
        );

        let err = registry.get_service("missing", None).await.unwrap_err();
        assert!(matches!(err, KernelError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_instance_name_collides_with_factory_name() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "cache",
                ServiceLifecycle::Singleton,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap();

        let instance: ServiceHandle = Arc::new(AtomicUsize::new(0));
        let err = registry.register_instance("cache", instance).unwrap_err();
        assert!(matches!(err, KernelError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_replace_instance_overwrites() {
        let (registry, _context) = installed_registry();
        let original: ServiceHandle = Arc::new(AtomicUsize::new(1));
        registry.register_instance("config", original).unwrap();

        let replacement: ServiceHandle = Arc::new(AtomicUsize::new(2));
        registry.replace_instance("config", replacement).unwrap();

        let resolved = registry.get_service("config", None).await.unwrap();
        assert_eq!(
            downcast_service::<AtomicUsize>(&resolved)
                .unwrap()
                .load(Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn test_construction_without_context_is_a_configuration_error() {
        let registry = ServiceRegistry::new();
        registry
            .register_factory(ServiceRegistration::new(
                "cache",
                ServiceLifecycle::Singleton,
                counter_factory(Arc::new(AtomicUsize::new(0))),
            ))
            .unwrap();

        let err = registry.get_service("cache", None).await.unwrap_err();
        assert!(matches!(err, KernelError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reentrant_construction_reports_the_full_path() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "a",
                ServiceLifecycle::Singleton,
                |context: Arc<dyn PluginContext>| async move {
                    context.get_service("b").await?;
                    let handle: ServiceHandle = Arc::new(());
                    Ok(handle)
                },
            ))
            .unwrap();
        registry
            .register_factory(ServiceRegistration::new(
                "b",
                ServiceLifecycle::Singleton,
                |context: Arc<dyn PluginContext>| async move {
                    context.get_service("a").await?;
                    let handle: ServiceHandle = Arc::new(());
                    Ok(handle)
                },
            ))
            .unwrap();

        let err = registry.get_service("a", None).await.unwrap_err();
        match err {
            KernelError::CircularDependency { path } => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_referential_factory_is_caught() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "selfish",
                ServiceLifecycle::Transient,
                |context: Arc<dyn PluginContext>| async move {
                    context.get_service("selfish").await?;
                    let handle: ServiceHandle = Arc::new(());
                    Ok(handle)
                },
            ))
            .unwrap();

        let err = registry.get_service("selfish", None).await.unwrap_err();
        match err {
            KernelError::CircularDependency { path } => {
                assert_eq!(path, vec!["selfish", "selfish"]);
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_singleton_first_access_constructs_once() {
        let (registry, _context) = installed_registry();
        let built = Arc::new(AtomicUsize::new(0));
        let slow_built = built.clone();
        registry
            .register_factory(ServiceRegistration::new(
                "slow",
                ServiceLifecycle::Singleton,
                move |_context| {
                    let built = slow_built.clone();
                    async move {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        built.fetch_add(1, Ordering::SeqCst);
                        let handle: ServiceHandle = Arc::new(AtomicUsize::new(0));
                        Ok(handle)
                    }
                },
            ))
            .unwrap();

        let (first, second) = tokio::join!(
            registry.get_service("slow", None),
            registry.get_service("slow", None)
        );
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_resolves_its_dependency_through_the_context() {
        let (registry, _context) = installed_registry();
        registry
            .register_factory(ServiceRegistration::new(
                "store",
                ServiceLifecycle::Singleton,
                |_context| async {
                    let handle: ServiceHandle = Arc::new(AtomicUsize::new(10));
                    Ok(handle)
                },
            ))
            .unwrap();
        registry
            .register_factory(
                ServiceRegistration::new(
                    "reporting",
                    ServiceLifecycle::Singleton,
                    |context: Arc<dyn PluginContext>| async move {
                        let store = context.get_service("store").await?;
                        let seed = downcast_service::<AtomicUsize>(&store)
                            .map(|counter| counter.load(Ordering::SeqCst))
                            .unwrap_or_default();
                        let handle: ServiceHandle = Arc::new(AtomicUsize::new(seed * 2));
                        Ok(handle)
                    },
                )
                .with_dependencies(["store"]),
            )
            .unwrap();

        let reporting = registry.get_service("reporting", None).await.unwrap();
        assert_eq!(
            downcast_service::<AtomicUsize>(&reporting)
                .unwrap()
                .load(Ordering::SeqCst),
            20
        );
    }

    #[test]
    fn test_detect_cycles_in_declared_dependencies() {
        let registry = ServiceRegistry::new();
        let noop = |_context: Arc<dyn PluginContext>| async {
            let handle: ServiceHandle = Arc::new(());
            Ok(handle)
        };
        registry
            .register_factory(
                ServiceRegistration::new("a", ServiceLifecycle::Singleton, noop)
                    .with_dependencies(["b"]),
            )
            .unwrap();
        registry
            .register_factory(
                ServiceRegistration::new("b", ServiceLifecycle::Singleton, noop)
                    .with_dependencies(["a"]),
            )
            .unwrap();
        registry
            .register_factory(
                ServiceRegistration::new("c", ServiceLifecycle::Singleton, noop)
                    .with_dependencies(["a"]),
            )
            .unwrap();

        let cycles = registry.detect_circular_dependencies();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].contains(&"a".to_string()));
        assert!(cycles[0].contains(&"b".to_string()));
    }

    #[test]
    fn test_acyclic_graph_reports_no_cycles() {
        let registry = ServiceRegistry::new();
        let noop = |_context: Arc<dyn PluginContext>| async {
            let handle: ServiceHandle = Arc::new(());
            Ok(handle)
        };
        registry
            .register_factory(
                ServiceRegistration::new("a", ServiceLifecycle::Singleton, noop)
                    .with_dependencies(["b"]),
            )
            .unwrap();
        registry
            .register_factory(
                ServiceRegistration::new("b", ServiceLifecycle::Singleton, noop)
                    .with_dependencies(["c"]),
            )
            .unwrap();
        registry
            .register_factory(ServiceRegistration::new(
                "c",
                ServiceLifecycle::Singleton,
                noop,
            ))
            .unwrap();

        assert!(registry.detect_circular_dependencies().is_empty());
    }

    #[test]
    fn test_lifecycle_serialization() {
        let json = serde_json::to_string(&ServiceLifecycle::Singleton).unwrap();
        assert_eq!(json, "\"singleton\"");

        let parsed: ServiceLifecycle = serde_json::from_str("\"scoped\"").unwrap();
        assert_eq!(parsed, ServiceLifecycle::Scoped);
    }
}
