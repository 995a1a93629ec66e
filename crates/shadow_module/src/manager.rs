//! Module lifecycle manager
//!
//! The [`ModuleManager`] owns the registry, the assembly catalog and cache,
//! and every live [`ModuleInstance`]. It activates modules in dependency
//! order, drives the per-frame phases in registration order and tears
//! everything down in reverse on shutdown.
//!
//! Registration order puts every module after its dependencies. Modules
//! with no dependency relationship run in an unspecified order that stays
//! the same for the whole run: the order in which they were activated.
//!
//! Module callbacks get a [`ModuleContext`] with read-only access to the
//! manager. While a callback runs, its own module object is taken out of
//! the instance, so looking up the calling module reports it as busy.

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shadow_core::{Delegate, FrameTime, PathId};

use crate::assembly::{AssemblyCache, AssemblyCatalog, StaticAssembly};
use crate::descriptor::ModuleDescriptor;
use crate::error::{ModuleError, ResolutionError, Result};
use crate::factory::instantiate;
use crate::instance::{ModuleInstance, ModuleState};
use crate::module::{Module, Phase, PhaseCall, PlatformEvent};
use crate::recovery::guard;
use crate::registry::ModuleRegistry;
use crate::resolver::resolve;

/// Domain used by [`ModuleManager::activate_module`]
pub const DEFAULT_DOMAIN: &str = "default";

/// Notifications about module lifecycle changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Activated { module: String, domain: String },
    Deactivated { module: String },
    Enabled { module: String },
    Disabled { module: String },
    Failed { module: String, reason: String },
}

/// A module callback that failed during a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseFailure {
    pub module: String,
    pub message: String,
}

/// Outcome of running one phase over all live modules
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Number of modules whose callback ran
    pub invoked: usize,
    pub failures: Vec<PhaseFailure>,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            invoked: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only view of the manager handed to module callbacks
pub struct ModuleContext<'a> {
    manager: &'a ModuleManager,
    descriptor: &'a ModuleDescriptor,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(manager: &'a ModuleManager, descriptor: &'a ModuleDescriptor) -> Self {
        Self { manager, descriptor }
    }

    /// Id of the module being called
    pub fn id(&self) -> &'a str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &'a ModuleDescriptor {
        self.descriptor
    }

    pub fn manager(&self) -> &'a ModuleManager {
        self.manager
    }

    pub fn get_by_id(&self, id: &str) -> Result<&'a ModuleInstance> {
        self.manager.get_by_id(id)
    }

    /// Typed lookup of another module
    pub fn get<T: Module>(&self, id: &str) -> Result<&'a T> {
        self.manager.get_by_id_as::<T>(id)
    }

    pub fn get_by_type<T: Module>(&self) -> Result<&'a T> {
        self.manager.get_by_type::<T>()
    }

    pub fn is_module_active(&self, id: &str) -> bool {
        self.manager.is_module_active(id)
    }
}

/// Owns modules and drives their lifecycle
///
/// Phases visit live modules in registration order. Unrelated modules keep
/// their relative order until one of them is deactivated and activated
/// again, which moves it to the end.
pub struct ModuleManager {
    registry: ModuleRegistry,
    catalog: AssemblyCatalog,
    assemblies: AssemblyCache,
    /// Live instances in registration order
    live: Vec<ModuleInstance>,
    /// States of ids that have no live instance
    states: HashMap<String, ModuleState>,
    default_domain: String,
    events: Delegate<LifecycleEvent>,
}

fn normalize(id: &str) -> Result<String> {
    Ok(PathId::parse(id)?.to_string())
}

impl ModuleManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::with_catalog(AssemblyCatalog::new())
    }

    /// Create a manager over a prepared catalog
    pub fn with_catalog(catalog: AssemblyCatalog) -> Self {
        Self {
            registry: ModuleRegistry::new(),
            catalog,
            assemblies: AssemblyCache::new(),
            live: Vec::new(),
            states: HashMap::new(),
            default_domain: DEFAULT_DOMAIN.to_string(),
            events: Delegate::new(),
        }
    }

    pub fn set_default_domain(&mut self, domain: impl Into<String>) {
        self.default_domain = domain.into();
    }

    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &AssemblyCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut AssemblyCatalog {
        &mut self.catalog
    }

    pub fn assemblies(&self) -> &AssemblyCache {
        &self.assemblies
    }

    /// Subscribe here to observe activations, failures and teardown
    pub fn lifecycle_events(&self) -> &Delegate<LifecycleEvent> {
        &self.events
    }

    // Registration

    /// Declare a shared library assembly
    pub fn add_library_assembly(&mut self, id: &str, path: impl AsRef<std::path::Path>) -> Result<String> {
        Ok(self.catalog.add_library(id, path)?)
    }

    /// Declare an in-process assembly and register its modules
    pub fn install_static_assembly(&mut self, assembly: StaticAssembly) -> Result<String> {
        let id = self.catalog.add_static(assembly)?;
        self.load_modules_from_assembly(&id)?;
        Ok(id)
    }

    /// Load an assembly and run its registration entry point
    ///
    /// Runs at most once per assembly; later calls return 0.
    pub fn load_modules_from_assembly(&mut self, id: &str) -> Result<usize> {
        let id = normalize(id)?;
        if self.registry.is_scanned(&id) {
            return Ok(0);
        }

        let handle = self.assemblies.load(&self.catalog, &id)?;
        let registered = match self.assemblies.get(handle) {
            Some(assembly) => assembly.register(&mut self.registry),
            None => Ok(0),
        };

        match registered {
            Ok(count) => {
                self.registry.mark_scanned(&id);
                log::info!("Registered {} module(s) from '{}'", count, id);
                Ok(count)
            }
            Err(e) => {
                log::error!("Failed to register modules from '{}': {}", id, e);
                self.assemblies.unload(&id);
                Err(e)
            }
        }
    }

    /// Register descriptors on behalf of an assembly
    pub fn register_assembly(&mut self, assembly_id: &str, descriptors: Vec<ModuleDescriptor>) -> Result<usize> {
        Ok(self.registry.register_assembly(assembly_id, descriptors)?)
    }

    /// Register one descriptor that names its assembly
    pub fn register_descriptor(&mut self, descriptor: ModuleDescriptor) -> Result<()> {
        Ok(self.registry.add_descriptor(descriptor)?)
    }

    // Activation

    /// Activate a module and its dependencies in the default domain
    pub fn activate_module(&mut self, id: &str) -> Result<()> {
        let domain = self.default_domain.clone();
        self.activate_module_in(id, &domain)
    }

    /// Activate a module and its dependencies, tagging new instances with
    /// `domain`. Activating a live module does nothing.
    pub fn activate_module_in(&mut self, id: &str, domain: &str) -> Result<()> {
        let root = normalize(id)?;
        if self.index_of(&root).is_some() {
            return Ok(());
        }
        if !self.registry.contains(&root) {
            return Err(ResolutionError::UnknownModule(root).into());
        }

        if let Some(previous) = self.states.get(&root).filter(|state| state.is_terminal()) {
            log::debug!("Activating '{}' again after it was {}", root, previous);
        }
        self.states.insert(root.clone(), ModuleState::Resolving);
        let order = match resolve(&self.registry, &root) {
            Ok(order) => order,
            Err(e) => {
                self.mark_failed(&root, e.to_string());
                return Err(e.into());
            }
        };

        // Construct everything first so a load failure leaves nothing behind
        let mut pending: Vec<ModuleInstance> = Vec::new();
        for descriptor in order {
            if self.index_of(&descriptor.id).is_some() {
                continue;
            }
            match instantiate(&descriptor, domain, &self.catalog, &mut self.assemblies) {
                Ok(instance) => pending.push(instance),
                Err(e) => {
                    log::error!("Failed to activate '{}': {}", root, e);
                    for instance in pending.into_iter().rev() {
                        self.discard(instance);
                    }
                    self.mark_failed(&descriptor.id, e.to_string());
                    if descriptor.id != root {
                        self.mark_failed(&root, e.to_string());
                    }
                    return Err(e.into());
                }
            }
        }

        let first_new = self.live.len();
        let mut pending = pending.into_iter();
        while let Some(mut instance) = pending.next() {
            for (phase, reached) in [
                (Phase::PreInit, ModuleState::PreInitialized),
                (Phase::Init, ModuleState::Initialized),
            ] {
                if let Err(message) = self.call_instance(&mut instance, PhaseCall::Plain(phase)) {
                    let failed = instance.id().to_string();
                    log::error!("Module '{}' failed during {}: {}", failed, phase, message);

                    self.discard(instance);
                    self.mark_failed(&failed, message.clone());
                    for rest in pending.by_ref() {
                        self.discard(rest);
                    }
                    self.rollback(first_new);
                    if failed != root {
                        self.mark_failed(&root, format!("dependency '{}' failed during {}", failed, phase));
                    }
                    return Err(ModuleError::Callback {
                        module: failed,
                        phase,
                        message,
                    });
                }
                instance.state = reached;
            }

            instance.state = ModuleState::Active;
            let id = instance.id().to_string();
            let domain = instance.domain.clone();
            self.states.remove(&id);
            self.live.push(instance);
            log::info!("Activated module '{}' in domain '{}'", id, domain);
            self.events.invoke(&LifecycleEvent::Activated { module: id, domain });
        }
        Ok(())
    }

    /// Destroy a live module
    ///
    /// Refused with [`ModuleError::DependentsStillActive`] while other live
    /// modules depend on it; nothing is cascaded.
    pub fn deactivate_module(&mut self, id: &str) -> Result<()> {
        let id = normalize(id)?;
        let index = self.index_of(&id).ok_or_else(|| ModuleError::NotFound(id.clone()))?;

        let dependents: Vec<String> = self
            .live
            .iter()
            .filter(|instance| instance.descriptor.requires(&id))
            .map(|instance| instance.id().to_string())
            .collect();
        if !dependents.is_empty() {
            return Err(ModuleError::DependentsStillActive { module: id, dependents });
        }

        let instance = self.live.remove(index);
        self.teardown(instance);
        Ok(())
    }

    /// Destroy every live module tagged with `domain`, dependents first
    ///
    /// Refused as a whole if a module outside the domain depends on one
    /// inside it.
    pub fn deactivate_domain(&mut self, domain: &str) -> Result<usize> {
        let members: HashSet<&str> = self
            .live
            .iter()
            .filter(|instance| instance.domain == domain)
            .map(|instance| instance.id())
            .collect();

        for member in &members {
            let outside: Vec<String> = self
                .live
                .iter()
                .filter(|instance| instance.domain != domain && instance.descriptor.requires(member))
                .map(|instance| instance.id().to_string())
                .collect();
            if !outside.is_empty() {
                return Err(ModuleError::DependentsStillActive {
                    module: member.to_string(),
                    dependents: outside,
                });
            }
        }

        let mut count = 0;
        for index in (0..self.live.len()).rev() {
            if self.live[index].domain == domain {
                let instance = self.live.remove(index);
                self.teardown(instance);
                count += 1;
            }
        }
        log::info!("Deactivated {} module(s) in domain '{}'", count, domain);
        Ok(count)
    }

    /// Toggle between `Active` and `Disabled`
    ///
    /// Disabled modules skip every phase but keep their state and stay
    /// findable. Re-enabling does not run `init` again.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let id = normalize(id)?;
        let index = self.index_of(&id).ok_or_else(|| ModuleError::NotFound(id.clone()))?;

        let target = if enabled { ModuleState::Active } else { ModuleState::Disabled };
        let instance = &mut self.live[index];
        if !instance.state.is_live() {
            return Err(ModuleError::NotFound(id));
        }
        if instance.state == target {
            return Ok(());
        }
        instance.state = target;

        let event = if enabled {
            LifecycleEvent::Enabled { module: id }
        } else {
            LifecycleEvent::Disabled { module: id }
        };
        log::debug!("{:?}", event);
        self.events.invoke(&event);
        Ok(())
    }

    // Lookup

    /// Find a live module, enabled or not
    pub fn get_by_id(&self, id: &str) -> Result<&ModuleInstance> {
        let index = match self.index_of(id) {
            Some(index) => index,
            None => {
                let normalized = normalize(id)?;
                self.index_of(&normalized).ok_or(ModuleError::NotFound(normalized))?
            }
        };
        Ok(&self.live[index])
    }

    /// Find a live module and downcast it
    pub fn get_by_id_as<T: Module>(&self, id: &str) -> Result<&T> {
        let instance = self.get_by_id(id)?;
        if instance.is_busy() {
            return Err(ModuleError::Busy(instance.id().to_string()));
        }
        instance.downcast_ref::<T>().ok_or_else(|| ModuleError::TypeMismatch {
            module: instance.id().to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Find the first live module of type `T`
    ///
    /// Reports [`ModuleError::Busy`] when the only instances of `T` are
    /// running a callback, like [`get_by_id_as`](Self::get_by_id_as).
    pub fn get_by_type<T: Module>(&self) -> Result<&T> {
        let mut busy = None;
        for instance in self.live.iter().filter(|instance| instance.is::<T>()) {
            match instance.downcast_ref::<T>() {
                Some(module) => return Ok(module),
                None => {
                    busy.get_or_insert_with(|| instance.id().to_string());
                }
            }
        }
        Err(match busy {
            Some(id) => ModuleError::Busy(id),
            None => ModuleError::NotFound(type_name::<T>().to_string()),
        })
    }

    /// Check whether a module has a live instance
    pub fn is_module_active(&self, id: &str) -> bool {
        self.get_by_id(id).map(|instance| instance.state().is_live()).unwrap_or(false)
    }

    /// Run `f` with the module if it has a live instance
    pub fn if_module_active<R>(&self, id: &str, f: impl FnOnce(&ModuleInstance) -> R) -> Option<R> {
        self.get_by_id(id).ok().map(f)
    }

    /// Live modules in registration order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInstance> {
        self.live.iter()
    }

    /// Number of live modules
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Current state of a module, `None` for unknown ids
    pub fn state_of(&self, id: &str) -> Option<ModuleState> {
        let id = normalize(id).ok()?;
        if let Some(index) = self.index_of(&id) {
            return Some(self.live[index].state);
        }
        if let Some(state) = self.states.get(&id) {
            return Some(*state);
        }
        self.registry.contains(&id).then_some(ModuleState::Registered)
    }

    // Frame phases

    pub fn update(&mut self, time: &FrameTime) -> PhaseReport {
        self.run_phase(PhaseCall::Update(time))
    }

    pub fn pre_render(&mut self) -> PhaseReport {
        self.run_phase(PhaseCall::Plain(Phase::PreRender))
    }

    pub fn render(&mut self) -> PhaseReport {
        self.run_phase(PhaseCall::Plain(Phase::Render))
    }

    pub fn late_render(&mut self) -> PhaseReport {
        self.run_phase(PhaseCall::Plain(Phase::LateRender))
    }

    pub fn after_frame_end(&mut self) -> PhaseReport {
        self.run_phase(PhaseCall::Plain(Phase::AfterFrameEnd))
    }

    /// Forward a platform event to every enabled module
    pub fn event(&mut self, event: &PlatformEvent) -> PhaseReport {
        self.run_phase(PhaseCall::Event(event))
    }

    /// Run every frame phase in order
    pub fn run_frame(&mut self, time: &FrameTime) -> Vec<PhaseReport> {
        vec![
            self.update(time),
            self.pre_render(),
            self.render(),
            self.late_render(),
            self.after_frame_end(),
        ]
    }

    fn run_phase(&mut self, call: PhaseCall<'_>) -> PhaseReport {
        let phase = call.phase();
        let mut report = PhaseReport::new(phase);

        for index in 0..self.live.len() {
            if self.live[index].state != ModuleState::Active {
                continue;
            }
            let Some(mut module) = self.live[index].module.take() else {
                continue;
            };
            let descriptor = Arc::clone(&self.live[index].descriptor);

            let result = {
                let ctx = ModuleContext::new(self, &descriptor);
                guard(|| call.dispatch(module.as_mut(), &ctx))
            };
            self.live[index].module = Some(module);
            report.invoked += 1;

            if let Err(message) = result {
                log::error!("Module '{}' failed during {}: {}", descriptor.id, phase, message);
                report.failures.push(PhaseFailure {
                    module: descriptor.id.clone(),
                    message,
                });
            }
        }
        report
    }

    // Reload

    /// Destroy and re-create a module in the same domain
    ///
    /// Refused like [`deactivate_module`](Self::deactivate_module) while
    /// dependents are live. If this was the assembly's last module, the
    /// library is closed and opened again from disk.
    pub fn reload_module(&mut self, id: &str) -> Result<()> {
        let id = normalize(id)?;
        let index = self.index_of(&id).ok_or_else(|| ModuleError::NotFound(id.clone()))?;
        let domain = self.live[index].domain.clone();
        let enabled = self.live[index].is_enabled();

        self.deactivate_module(&id)?;
        self.activate_module_in(&id, &domain)?;
        if !enabled {
            self.set_enabled(&id, false)?;
        }
        log::info!("Reloaded module '{}'", id);
        Ok(())
    }

    /// Reload every module an assembly provides, plus whatever depends on
    /// them, so the assembly can be unloaded and opened fresh
    ///
    /// Returns the number of modules re-activated.
    pub fn reload_assembly(&mut self, assembly_id: &str) -> Result<usize> {
        let assembly_id = normalize(assembly_id)?;

        let mut affected: HashSet<String> = self
            .live
            .iter()
            .filter(|instance| instance.descriptor.assembly == assembly_id)
            .map(|instance| instance.id().to_string())
            .collect();
        loop {
            let more: Vec<String> = self
                .live
                .iter()
                .filter(|instance| !affected.contains(instance.id()))
                .filter(|instance| instance.descriptor.dependencies.iter().any(|d| affected.contains(d)))
                .map(|instance| instance.id().to_string())
                .collect();
            if more.is_empty() {
                break;
            }
            affected.extend(more);
        }

        let plan: Vec<(String, String, bool)> = self
            .live
            .iter()
            .filter(|instance| affected.contains(instance.id()))
            .map(|instance| (instance.id().to_string(), instance.domain.clone(), instance.is_enabled()))
            .collect();

        for (id, _, _) in plan.iter().rev() {
            if let Some(index) = self.index_of(id) {
                let instance = self.live.remove(index);
                self.teardown(instance);
            }
        }
        self.assemblies.unload(&assembly_id);

        let mut first_error = None;
        let mut reactivated = 0;
        for (id, domain, enabled) in &plan {
            let result = self
                .activate_module_in(id, domain)
                .and_then(|()| if *enabled { Ok(()) } else { self.set_enabled(id, false) });
            match result {
                Ok(()) => reactivated += 1,
                Err(e) => {
                    log::error!("Failed to reactivate '{}' after reloading '{}': {}", id, assembly_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        log::info!("Reloaded assembly '{}' ({} module(s))", assembly_id, reactivated);
        match first_error {
            Some(e) => Err(e),
            None => Ok(reactivated),
        }
    }

    // Shutdown

    /// Destroy every live module in reverse registration order, then unload
    /// all assemblies
    pub fn shutdown(&mut self) {
        if !self.live.is_empty() {
            log::info!("Shutting down {} module(s)", self.live.len());
        }
        while let Some(instance) = self.live.pop() {
            self.teardown(instance);
        }
        self.assemblies.unload_all();
    }

    // Internals

    fn index_of(&self, id: &str) -> Option<usize> {
        self.live.iter().position(|instance| instance.id() == id)
    }

    fn call_instance(&self, instance: &mut ModuleInstance, call: PhaseCall<'_>) -> std::result::Result<(), String> {
        let Some(mut module) = instance.module.take() else {
            return Err(format!("module '{}' is busy", instance.id()));
        };
        let result = {
            let ctx = ModuleContext::new(self, &instance.descriptor);
            guard(|| call.dispatch(module.as_mut(), &ctx))
        };
        instance.module = Some(module);
        result
    }

    /// Destroy a module that completed activation
    fn teardown(&mut self, mut instance: ModuleInstance) {
        if let Err(message) = self.call_instance(&mut instance, PhaseCall::Plain(Phase::Destroy)) {
            log::error!("Module '{}' failed during {}: {}", instance.id(), Phase::Destroy, message);
        }

        let ModuleInstance {
            descriptor,
            assembly,
            module,
            ..
        } = instance;
        // The module's code lives in the assembly, so it goes first
        drop(module);
        self.assemblies.release(assembly);

        self.states.insert(descriptor.id.clone(), ModuleState::Destroyed);
        log::info!("Destroyed module '{}'", descriptor.id);
        self.events.invoke(&LifecycleEvent::Deactivated {
            module: descriptor.id.clone(),
        });
    }

    /// Drop a module that never completed activation
    fn discard(&mut self, instance: ModuleInstance) {
        let ModuleInstance {
            descriptor,
            assembly,
            module,
            ..
        } = instance;
        drop(module);
        self.assemblies.release(assembly);
        self.states.remove(&descriptor.id);
    }

    /// Undo the instances activated since `first_new`, newest first
    fn rollback(&mut self, first_new: usize) {
        while self.live.len() > first_new {
            if let Some(instance) = self.live.pop() {
                self.teardown(instance);
            }
        }
    }

    fn mark_failed(&mut self, id: &str, reason: String) {
        self.states.insert(id.to_string(), ModuleState::Failed);
        self.events.invoke(&LifecycleEvent::Failed {
            module: id.to_string(),
            reason,
        });
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        if !self.live.is_empty() || !self.assemblies.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhaseError;
    use crate::module::PhaseResult;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counter {
        updates: u32,
    }

    impl Module for Counter {
        fn update(&mut self, _ctx: &ModuleContext<'_>, _time: &FrameTime) -> PhaseResult {
            self.updates += 1;
            Ok(())
        }
    }

    struct Reader {
        seen: Arc<Mutex<Option<u32>>>,
    }

    impl Module for Reader {
        fn update(&mut self, ctx: &ModuleContext<'_>, _time: &FrameTime) -> PhaseResult {
            let counter = ctx.get::<Counter>("module:/counter").map_err(|e| PhaseError::new(e.to_string()))?;
            *self.seen.lock() = Some(counter.updates);
            // Looking up the calling module itself is refused, by id or by type
            if !matches!(ctx.get_by_type::<Reader>(), Err(ModuleError::Busy(_))) {
                return Err(PhaseError::new("expected busy by type"));
            }
            match ctx.get::<Reader>(ctx.id()) {
                Err(ModuleError::Busy(_)) => Ok(()),
                _ => Err(PhaseError::new("expected busy")),
            }
        }
    }

    fn time() -> FrameTime {
        FrameTime {
            frame: 1,
            delta: 0.016,
            elapsed: 0.016,
        }
    }

    fn manager(seen: Arc<Mutex<Option<u32>>>) -> ModuleManager {
        let mut manager = ModuleManager::new();
        manager
            .install_static_assembly(
                StaticAssembly::new("assembly:/test")
                    .module(ModuleDescriptor::new("module:/counter", "Counter", "Counter"), || {
                        Some(Box::new(Counter::default()))
                    })
                    .module(
                        ModuleDescriptor::new("module:/reader", "Reader", "Reader").depends_on("module:/counter"),
                        move || Some(Box::new(Reader { seen: Arc::clone(&seen) })),
                    ),
            )
            .unwrap();
        manager
    }

    #[test]
    fn test_context_lookup_during_update() {
        let seen = Arc::new(Mutex::new(None));
        let mut manager = manager(Arc::clone(&seen));
        manager.activate_module("module:/reader").unwrap();

        let report = manager.update(&time());
        assert!(report.is_ok(), "{:?}", report.failures);
        assert_eq!(report.invoked, 2);
        assert_eq!(*seen.lock(), Some(1));
    }

    #[test]
    fn test_typed_lookup() {
        let mut manager = manager(Arc::new(Mutex::new(None)));
        manager.activate_module("module:/counter").unwrap();

        assert!(manager.get_by_id_as::<Counter>("module:/counter").is_ok());
        assert!(manager.get_by_type::<Counter>().is_ok());
        assert!(matches!(
            manager.get_by_id_as::<Reader>("module:/counter"),
            Err(ModuleError::TypeMismatch { .. })
        ));
        assert!(matches!(manager.get_by_type::<Reader>(), Err(ModuleError::NotFound(_))));
        assert!(manager.get_by_id("module:/counter").unwrap().is::<Counter>());
    }

    #[test]
    fn test_state_of() {
        let mut manager = manager(Arc::new(Mutex::new(None)));
        assert_eq!(manager.state_of("module:/counter"), Some(ModuleState::Registered));
        assert_eq!(manager.state_of("module:/nothing"), None);

        manager.activate_module("module:/counter").unwrap();
        assert_eq!(manager.state_of("module:/counter"), Some(ModuleState::Active));

        manager.deactivate_module("module:/counter").unwrap();
        assert_eq!(manager.state_of("module:/counter"), Some(ModuleState::Destroyed));
    }

    #[test]
    fn test_if_module_active() {
        let mut manager = manager(Arc::new(Mutex::new(None)));
        assert_eq!(manager.if_module_active("module:/counter", |_| 1), None);
        manager.activate_module("module:/counter").unwrap();
        assert_eq!(
            manager.if_module_active("module:/counter", |m| m.domain().to_string()),
            Some(DEFAULT_DOMAIN.to_string())
        );
    }

    #[test]
    fn test_static_assembly_scanned_once() {
        let mut manager = manager(Arc::new(Mutex::new(None)));
        assert_eq!(manager.load_modules_from_assembly("assembly:/test").unwrap(), 0);
        assert_eq!(manager.registry().len(), 2);
    }
}
