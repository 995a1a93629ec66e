//! Lifecycle manager tests
//!
//! Modules here record every callback into a shared journal so tests can
//! assert on call order across modules.

use std::sync::Arc;

use parking_lot::Mutex;
use shadow_core::FrameTime;
use shadow_module::prelude::*;
use shadow_module::{LifecycleEvent, ModuleState, ResolutionError};

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Misbehave {
    Fail(Phase),
    Panic(Phase),
}

struct JournalModule {
    name: String,
    journal: Journal,
    misbehave: Option<Misbehave>,
}

impl JournalModule {
    fn record(&self, phase: Phase) -> PhaseResult {
        self.journal.lock().push(format!("{}:{}", self.name, phase));
        match self.misbehave {
            Some(Misbehave::Fail(p)) if p == phase => Err(PhaseError::new(format!("{} refused {}", self.name, phase))),
            Some(Misbehave::Panic(p)) if p == phase => panic!("{} exploded in {}", self.name, phase),
            _ => Ok(()),
        }
    }
}

impl Module for JournalModule {
    fn pre_init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::PreInit)
    }

    fn init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::Init)
    }

    fn update(&mut self, _ctx: &ModuleContext<'_>, _time: &FrameTime) -> PhaseResult {
        self.record(Phase::Update)
    }

    fn pre_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::PreRender)
    }

    fn render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::Render)
    }

    fn late_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::LateRender)
    }

    fn after_frame_end(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::AfterFrameEnd)
    }

    fn event(&mut self, _ctx: &ModuleContext<'_>, _event: &PlatformEvent) -> PhaseResult {
        self.record(Phase::Event)
    }

    fn destroy(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.record(Phase::Destroy)
    }
}

struct Plan {
    name: &'static str,
    deps: &'static [&'static str],
    misbehave: Option<Misbehave>,
    constructible: bool,
}

fn ok(name: &'static str, deps: &'static [&'static str]) -> Plan {
    Plan {
        name,
        deps,
        misbehave: None,
        constructible: true,
    }
}

fn id(name: &str) -> String {
    format!("module:/{}", name)
}

fn assembly(assembly_id: &str, journal: &Journal, plans: Vec<Plan>) -> StaticAssembly {
    let mut assembly = StaticAssembly::new(assembly_id);
    for plan in plans {
        let mut descriptor = ModuleDescriptor::new(id(plan.name), plan.name, format!("{}Module", plan.name));
        for dep in plan.deps {
            descriptor = descriptor.depends_on(id(dep));
        }
        let journal = Arc::clone(journal);
        assembly = assembly.module(descriptor, move || {
            if !plan.constructible {
                return None;
            }
            Some(Box::new(JournalModule {
                name: plan.name.to_string(),
                journal: Arc::clone(&journal),
                misbehave: plan.misbehave,
            }))
        });
    }
    assembly
}

fn setup(plans: Vec<Plan>) -> (ModuleManager, Journal) {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut manager = ModuleManager::new();
    manager
        .install_static_assembly(assembly("assembly:/core", &journal, plans))
        .unwrap();
    (manager, journal)
}

fn core_scenario() -> (ModuleManager, Journal) {
    setup(vec![
        ok("core", &[]),
        ok("sdl2", &["core"]),
        ok("debug", &[]),
        ok("entity-system", &[]),
    ])
}

fn entries(journal: &Journal, phase: Phase) -> Vec<String> {
    let suffix = format!(":{}", phase);
    journal
        .lock()
        .iter()
        .filter(|e| e.ends_with(&suffix))
        .map(|e| e.trim_end_matches(&suffix).to_string())
        .collect()
}

fn live_ids(manager: &ModuleManager) -> Vec<String> {
    manager.modules().map(|m| m.id().to_string()).collect()
}

fn frame_time() -> FrameTime {
    FrameTime {
        frame: 1,
        delta: 1.0 / 60.0,
        elapsed: 1.0 / 60.0,
    }
}

#[test]
fn test_activate_sdl2_brings_up_core_first() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module("module:/sdl2").unwrap();

    assert_eq!(
        *journal.lock(),
        vec!["core:PreInit", "core:Init", "sdl2:PreInit", "sdl2:Init"]
    );
    assert_eq!(live_ids(&manager), vec![id("core"), id("sdl2")]);
    assert!(!manager.is_module_active("module:/debug"));
}

#[test]
fn test_activation_is_idempotent() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module("module:/sdl2").unwrap();
    manager.activate_module("module:/sdl2").unwrap();
    manager.activate_module("module:/core").unwrap();

    assert_eq!(entries(&journal, Phase::Init), vec!["core", "sdl2"]);
    assert_eq!(manager.len(), 2);
}

#[test]
fn test_frame_phases_run_in_registration_order() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module("module:/debug").unwrap();
    manager.activate_module("module:/sdl2").unwrap();
    journal.lock().clear();

    let reports = manager.run_frame(&frame_time());
    assert!(reports.iter().all(|r| r.is_ok() && r.invoked == 3));

    let expected: Vec<String> = Phase::FRAME
        .iter()
        .flat_map(|phase| ["debug", "core", "sdl2"].map(|m| format!("{}:{}", m, phase)))
        .collect();
    assert_eq!(*journal.lock(), expected);
}

#[test]
fn test_shutdown_destroys_in_reverse() {
    let (mut manager, journal) = setup(vec![ok("a", &[]), ok("b", &["a"]), ok("c", &["b"])]);
    manager.activate_module("module:/c").unwrap();
    manager.shutdown();

    assert_eq!(entries(&journal, Phase::Destroy), vec!["c", "b", "a"]);
    assert!(manager.is_empty());
    assert!(manager.assemblies().is_empty());
    assert_eq!(manager.state_of("module:/a"), Some(ModuleState::Destroyed));
}

#[test]
fn test_drop_shuts_down() {
    let (mut manager, journal) = setup(vec![ok("a", &[]), ok("b", &["a"])]);
    manager.activate_module("module:/b").unwrap();
    drop(manager);

    assert_eq!(entries(&journal, Phase::Destroy), vec!["b", "a"]);
}

#[test]
fn test_disabled_module_skips_phases_but_stays_findable() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module("module:/sdl2").unwrap();
    manager.set_enabled("module:/core", false).unwrap();
    journal.lock().clear();

    let report = manager.update(&frame_time());
    manager.event(&PlatformEvent::KeyUp { keycode: 4 });
    assert_eq!(report.invoked, 1);
    assert_eq!(*journal.lock(), vec!["sdl2:Update", "sdl2:Event"]);

    let core = manager.get_by_id("module:/core").unwrap();
    assert_eq!(core.state(), ModuleState::Disabled);
    assert!(!core.is_enabled());

    manager.set_enabled("module:/core", true).unwrap();
    manager.update(&frame_time());
    assert_eq!(entries(&journal, Phase::Update), vec!["sdl2", "core", "sdl2"]);
    assert!(entries(&journal, Phase::Init).is_empty());
}

#[test]
fn test_failing_update_does_not_stop_the_frame() {
    let (mut manager, journal) = setup(vec![
        Plan {
            misbehave: Some(Misbehave::Fail(Phase::Update)),
            ..ok("flaky", &[])
        },
        Plan {
            misbehave: Some(Misbehave::Panic(Phase::Update)),
            ..ok("explosive", &[])
        },
        ok("steady", &[]),
    ]);
    for name in ["flaky", "explosive", "steady"] {
        manager.activate_module(&id(name)).unwrap();
    }
    journal.lock().clear();

    let report = manager.update(&frame_time());
    assert_eq!(report.invoked, 3);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].module, id("flaky"));
    assert!(report.failures[1].message.contains("exploded"));
    assert_eq!(entries(&journal, Phase::Update), vec!["flaky", "explosive", "steady"]);

    // Failures are not sticky
    assert_eq!(manager.len(), 3);
    assert_eq!(manager.update(&frame_time()).invoked, 3);
}

#[test]
fn test_deactivate_with_live_dependent_is_refused() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module("module:/sdl2").unwrap();

    match manager.deactivate_module("module:/core") {
        Err(ModuleError::DependentsStillActive { module, dependents }) => {
            assert_eq!(module, id("core"));
            assert_eq!(dependents, vec![id("sdl2")]);
        }
        other => panic!("expected DependentsStillActive, got {:?}", other),
    }
    assert_eq!(live_ids(&manager), vec![id("core"), id("sdl2")]);
    assert_eq!(manager.state_of("module:/core"), Some(ModuleState::Active));
    assert!(entries(&journal, Phase::Destroy).is_empty());

    manager.deactivate_module("module:/sdl2").unwrap();
    manager.deactivate_module("module:/core").unwrap();
    assert_eq!(entries(&journal, Phase::Destroy), vec!["sdl2", "core"]);
}

#[test]
fn test_deactivate_unknown() {
    let (mut manager, _) = core_scenario();
    assert!(matches!(
        manager.deactivate_module("module:/debug"),
        Err(ModuleError::NotFound(_))
    ));
}

#[test]
fn test_assembly_unloads_with_last_module() {
    let (mut manager, _) = core_scenario();
    manager.activate_module("module:/sdl2").unwrap();
    manager.activate_module("module:/debug").unwrap();
    assert_eq!(manager.assemblies().ref_count("assembly:/core"), Some(3));

    manager.deactivate_module("module:/debug").unwrap();
    manager.deactivate_module("module:/sdl2").unwrap();
    assert_eq!(manager.assemblies().ref_count("assembly:/core"), Some(1));

    manager.deactivate_module("module:/core").unwrap();
    assert!(!manager.assemblies().is_loaded("assembly:/core"));

    // Loading again on demand
    manager.activate_module("module:/debug").unwrap();
    assert_eq!(manager.assemblies().ref_count("assembly:/core"), Some(1));
}

#[test]
fn test_init_failure_rolls_back_the_request() {
    let (mut manager, journal) = setup(vec![
        ok("base", &[]),
        ok("middle", &["base"]),
        Plan {
            misbehave: Some(Misbehave::Fail(Phase::Init)),
            ..ok("top", &["middle"])
        },
    ]);

    match manager.activate_module("module:/top") {
        Err(ModuleError::Callback { module, phase, .. }) => {
            assert_eq!(module, id("top"));
            assert_eq!(phase, Phase::Init);
        }
        other => panic!("expected a callback failure, got {:?}", other),
    }

    assert!(manager.is_empty());
    assert_eq!(entries(&journal, Phase::Destroy), vec!["middle", "base"]);
    assert_eq!(manager.state_of("module:/top"), Some(ModuleState::Failed));
    assert_eq!(manager.state_of("module:/base"), Some(ModuleState::Destroyed));
    assert!(!manager.assemblies().is_loaded("assembly:/core"));
}

#[test]
fn test_rollback_keeps_previously_active_modules() {
    let (mut manager, journal) = setup(vec![
        ok("base", &[]),
        Plan {
            misbehave: Some(Misbehave::Panic(Phase::PreInit)),
            ..ok("top", &["base"])
        },
    ]);
    manager.activate_module("module:/base").unwrap();

    assert!(manager.activate_module("module:/top").is_err());
    assert_eq!(live_ids(&manager), vec![id("base")]);
    assert!(entries(&journal, Phase::Destroy).is_empty());
    assert!(entries(&journal, Phase::Init).iter().all(|m| m == "base"));
}

#[test]
fn test_construction_failure_leaves_nothing_behind() {
    let (mut manager, journal) = setup(vec![
        ok("base", &[]),
        Plan {
            constructible: false,
            ..ok("broken", &["base"])
        },
    ]);

    match manager.activate_module("module:/broken") {
        Err(ModuleError::Instantiation(_)) => {}
        other => panic!("expected an instantiation error, got {:?}", other),
    }
    assert!(manager.is_empty());
    assert!(journal.lock().is_empty());
    assert_eq!(manager.state_of("module:/broken"), Some(ModuleState::Failed));
    assert_eq!(manager.state_of("module:/base"), Some(ModuleState::Registered));
}

#[test]
fn test_missing_dependency_fails_the_request_only() {
    let (mut manager, _) = setup(vec![ok("game", &["physics"]), ok("audio", &[])]);

    match manager.activate_module("module:/game") {
        Err(ModuleError::Resolution(ResolutionError::MissingDependency { missing, required_by })) => {
            assert_eq!(missing, id("physics"));
            assert_eq!(required_by, id("game"));
        }
        other => panic!("expected a missing dependency, got {:?}", other),
    }
    assert_eq!(manager.state_of("module:/game"), Some(ModuleState::Failed));

    manager.activate_module("module:/audio").unwrap();
    assert!(manager.is_module_active("module:/audio"));
}

#[test]
fn test_cycle_fails_without_constructing() {
    let (mut manager, journal) = setup(vec![ok("a", &["b"]), ok("b", &["a"])]);
    assert!(matches!(
        manager.activate_module("module:/a"),
        Err(ModuleError::Resolution(ResolutionError::CyclicDependency { .. }))
    ));
    assert!(journal.lock().is_empty());
    assert!(manager.is_empty());
}

#[test]
fn test_domains() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module_in("module:/core", "engine").unwrap();
    manager.activate_module_in("module:/sdl2", "platform").unwrap();
    manager.activate_module_in("module:/debug", "tools").unwrap();
    manager.activate_module_in("module:/entity-system", "tools").unwrap();

    assert_eq!(manager.get_by_id("module:/sdl2").unwrap().domain(), "platform");

    // sdl2 in another domain still needs core
    assert!(matches!(
        manager.deactivate_domain("engine"),
        Err(ModuleError::DependentsStillActive { .. })
    ));
    assert_eq!(manager.len(), 4);

    assert_eq!(manager.deactivate_domain("tools").unwrap(), 2);
    assert_eq!(entries(&journal, Phase::Destroy), vec!["entity-system", "debug"]);
    assert_eq!(live_ids(&manager), vec![id("core"), id("sdl2")]);
}

#[test]
fn test_lifecycle_events() {
    let (mut manager, _) = core_scenario();
    let seen: Arc<Mutex<Vec<LifecycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager.lifecycle_events().subscribe(move |e| sink.lock().push(e.clone()));

    manager.activate_module("module:/sdl2").unwrap();
    manager.set_enabled("module:/sdl2", false).unwrap();
    manager.deactivate_module("module:/sdl2").unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            LifecycleEvent::Activated {
                module: id("core"),
                domain: "default".into()
            },
            LifecycleEvent::Activated {
                module: id("sdl2"),
                domain: "default".into()
            },
            LifecycleEvent::Disabled { module: id("sdl2") },
            LifecycleEvent::Deactivated { module: id("sdl2") },
        ]
    );
}

#[test]
fn test_reload_module_keeps_domain_and_enabled_flag() {
    let (mut manager, journal) = core_scenario();
    manager.activate_module_in("module:/debug", "tools").unwrap();
    manager.set_enabled("module:/debug", false).unwrap();

    manager.reload_module("module:/debug").unwrap();

    let debug = manager.get_by_id("module:/debug").unwrap();
    assert_eq!(debug.domain(), "tools");
    assert_eq!(debug.state(), ModuleState::Disabled);
    assert_eq!(entries(&journal, Phase::Init), vec!["debug", "debug"]);
    assert_eq!(entries(&journal, Phase::Destroy), vec!["debug"]);
}

#[test]
fn test_reload_assembly_reactivates_in_order() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut manager = ModuleManager::new();
    manager
        .install_static_assembly(assembly("assembly:/engine", &journal, vec![ok("core", &[])]))
        .unwrap();
    manager
        .install_static_assembly(assembly(
            "assembly:/game",
            &journal,
            vec![ok("world", &["core"]), ok("hud", &["world"])],
        ))
        .unwrap();
    manager.activate_module("module:/hud").unwrap();
    journal.lock().clear();

    assert_eq!(manager.reload_assembly("assembly:/game").unwrap(), 2);
    assert_eq!(
        *journal.lock(),
        vec![
            "hud:Destroy",
            "world:Destroy",
            "world:PreInit",
            "world:Init",
            "hud:PreInit",
            "hud:Init",
        ]
    );
    assert_eq!(live_ids(&manager), vec![id("core"), id("world"), id("hud")]);
}

#[test]
fn test_typed_lookup_and_helpers() {
    let (mut manager, _) = core_scenario();
    manager.activate_module("module:/debug").unwrap();

    let debug = manager.get_by_id_as::<JournalModule>("module:/debug").unwrap();
    assert_eq!(debug.name, "debug");
    assert!(manager.get_by_type::<JournalModule>().is_ok());
    assert_eq!(
        manager.if_module_active("module:/debug", |m| m.descriptor().name.clone()),
        Some("debug".to_string())
    );
    assert!(matches!(
        manager.get_by_id("module:/core"),
        Err(ModuleError::NotFound(_))
    ));
}

#[test]
fn test_unregistered_module_leaves_no_state() {
    let (mut manager, journal) = core_scenario();
    let seen: Arc<Mutex<Vec<LifecycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager.lifecycle_events().subscribe(move |e| sink.lock().push(e.clone()));

    assert_eq!(manager.state_of("module:/ghost"), None);
    match manager.activate_module("module:/ghost") {
        Err(ModuleError::Resolution(ResolutionError::UnknownModule(module))) => assert_eq!(module, "module:/ghost"),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(manager.state_of("module:/ghost"), None);
    assert!(seen.lock().is_empty());
    assert!(journal.lock().is_empty());
    assert!(manager.is_empty());
}

#[test]
fn test_disabled_module_is_still_active() {
    let (mut manager, _) = core_scenario();
    manager.activate_module("module:/debug").unwrap();
    manager.set_enabled("module:/debug", false).unwrap();

    assert!(manager.is_module_active("module:/debug"));
    assert!(!manager.is_module_active("module:/core"));
    assert!(matches!(
        manager.set_enabled("module:/core", true),
        Err(ModuleError::NotFound(_))
    ));
}
