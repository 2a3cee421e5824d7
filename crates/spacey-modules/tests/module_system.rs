// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking, instantiation and evaluation of module graphs

mod common;

use common::{Counter, Fixture, Vu};
use parking_lot::Mutex;
use spacey_host::{Exception, Function, ModuleSource, Object, Program, Runtime, Value};
use spacey_modules::{
    BuiltinModule, Exports, FsLoader, HostInstance, HostModule, LoadError, Locator, ModuleError,
    ModuleResolver, ModuleSystem, ProgramTable, ResolverConfig, SourceData, Status,
};
use std::sync::Arc;

fn noop() -> ModuleSource {
    ModuleSource::new(|_, _| Ok(()))
}

#[test]
fn test_equivalent_specifiers_share_one_record() {
    let fixture = Fixture::new();
    fixture
        .graph(
            "file:///a/main.js",
            noop().requests(["./lib/x.js", "./lib/../lib/x.js", "/a/lib/x.js"]),
        )
        .graph("file:///a/lib/x.js", noop());
    let resolver = fixture.resolver();
    let mut vu = Vu::new(resolver.clone());
    vu.run("file:///a/main.js").unwrap();

    let base = Locator::parse("file:///a/").unwrap();
    let first = resolver.resolve(&base, "./lib/x.js").unwrap();
    let second = resolver.resolve(&base, "./lib/./x.js").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // the root is registered from its bytes, only x.js is loaded
    assert_eq!(fixture.loader.load_count(), 1);
    assert_eq!(fixture.compiler.compile_count(), 2);
    assert_eq!(vu.system.imported(), vec!["file:///a/lib/x.js", "file:///a/main.js"]);
}

#[test]
fn test_cycle_sees_values_assigned_during_evaluation() {
    let seen_by_y = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&seen_by_y);

    let fixture = Fixture::new();
    fixture
        .graph("file:///a/main.js", noop().requests(["./x.js"]))
        .graph(
            "file:///a/x.js",
            ModuleSource::new(|_, env| {
                let y = env.binding("./y.js", "y")?;
                env.export("x", Value::from(1))?;
                env.export(
                    "readY",
                    Value::from(Function::native("readY", move |_, _| Ok(y.get()))),
                )
            })
            .requests(["./y.js"])
            .exports(["x", "readY"]),
        )
        .graph(
            "file:///a/y.js",
            ModuleSource::new(move |_, env| {
                // x.js has not run yet; its slot exists but holds nothing
                *seen.lock() = Some(env.import("./x.js", "x")?);
                let x = env.binding("./x.js", "x")?;
                env.export("y", Value::from(2))?;
                env.export(
                    "readX",
                    Value::from(Function::native("readX", move |_, _| Ok(x.get()))),
                )
            })
            .requests(["./x.js"])
            .exports(["y", "readX"]),
        );

    let resolver = fixture.resolver();
    let mut vu = Vu::new(resolver.clone());
    vu.run("file:///a/main.js").unwrap();

    assert_eq!(*seen_by_y.lock(), Some(Value::Undefined));

    let base = resolver.base().clone();
    let x = resolver.resolve(&base, "./x.js").unwrap();
    let y = resolver.resolve(&base, "./y.js").unwrap();
    let read_y = vu.export(&x, "readY");
    let read_x = vu.export(&y, "readX");
    assert_eq!(vu.rt.call(&read_y, &[]).unwrap(), Value::from(2));
    assert_eq!(vu.rt.call(&read_x, &[]).unwrap(), Value::from(1));
}

#[test]
fn test_failed_dependency_rejects_dependents_only() {
    let runs = Counter::default();
    let z_runs = runs.clone();

    let fixture = Fixture::new();
    fixture
        .graph(
            "file:///a/z.js",
            ModuleSource::new(move |_, _| {
                z_runs.hit();
                Err(Exception::from(Value::from("boom")))
            }),
        )
        .graph("file:///a/w.js", noop().requests(["./z.js"]))
        .graph("file:///a/main.js", noop().requests(["./w.js"]))
        .graph(
            "file:///a/other.js",
            ModuleSource::new(|_, env| env.export("ok", Value::from(true))).exports(["ok"]),
        );

    let mut vu = Vu::new(fixture.resolver());
    let err = vu.run("file:///a/main.js").unwrap_err();
    assert!(matches!(err, ModuleError::Evaluation(Exception::Thrown(ref v)) if *v == Value::from("boom")));

    let resolver = Arc::clone(vu.system.resolver());
    let w = resolver.resolve(resolver.base(), "./w.js").unwrap();
    let status = vu.system.instance(&w).unwrap().status();
    assert!(matches!(status, Status::Failed(ModuleError::Evaluation(_))));

    // a second attempt gets the same failure without running z again
    let again = vu.system.evaluate(&mut vu.rt, &w).unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    assert_eq!(runs.get(), 1);

    let other = vu.run("file:///a/other.js").unwrap();
    assert_eq!(vu.export(&other, "ok"), Value::from(true));
}

#[test]
fn test_failure_in_cycle_fails_every_member() {
    let fixture = Fixture::new();
    fixture
        .graph(
            "file:///a/x.js",
            ModuleSource::new(|_, _| Err(Exception::from(Value::from("x failed")))).requests(["./y.js"]),
        )
        .graph(
            "file:///a/y.js",
            ModuleSource::new(|_, env| env.export("ok", Value::from(true)))
                .requests(["./x.js"])
                .exports(["ok"]),
        );

    let resolver = fixture.resolver();
    let mut vu = Vu::new(resolver.clone());
    let err = vu.run("file:///a/x.js").unwrap_err();

    // y finished its body before x threw, but it belongs to x's cycle
    let y = resolver.resolve(resolver.base(), "./y.js").unwrap();
    assert!(matches!(vu.system.instance(&y).unwrap().status(), Status::Failed(_)));
    let again = vu.system.evaluate(&mut vu.rt, &y).unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
}

#[test]
fn test_completed_cycle_is_evaluated_together() {
    let fixture = Fixture::new();
    fixture
        .graph("file:///a/main.js", noop().requests(["./x.js"]))
        .graph("file:///a/x.js", noop().requests(["./y.js"]))
        .graph("file:///a/y.js", noop().requests(["./x.js", "./z.js"]))
        .graph("file:///a/z.js", noop());

    let resolver = fixture.resolver();
    let mut vu = Vu::new(resolver.clone());
    vu.run("file:///a/main.js").unwrap();

    for specifier in ["./main.js", "./x.js", "./y.js", "./z.js"] {
        let record = resolver.resolve(resolver.base(), specifier).unwrap();
        let status = vu.system.instance(&record).unwrap().status();
        assert!(matches!(status, Status::Evaluated), "{specifier} is {status:?}");
    }
}

#[test]
fn test_unresolvable_dependency_fails_linking() {
    let fixture = Fixture::new();
    fixture
        .graph("file:///a/main.js", noop().requests(["./lib.js"]))
        .graph("file:///a/lib.js", noop().requests(["./missing.js"]));

    let mut vu = Vu::new(fixture.resolver());
    let err = vu.run("file:///a/main.js").unwrap_err();
    match err {
        ModuleError::Load(LoadError::NotFound { locator, specifier }) => {
            assert_eq!(locator, "file:///a/missing.js");
            assert_eq!(specifier, "./missing.js");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_compile_error_surfaces_from_run() {
    let fixture = Fixture::new();
    fixture.graph("file:///a/main.js", noop().requests(["./broken.js"]));
    fixture.loader.insert("file:///a/broken.js", "export %%");

    let mut vu = Vu::new(fixture.resolver());
    let err = vu.run("file:///a/main.js").unwrap_err();
    assert!(matches!(err, ModuleError::Compile { ref name, source: Exception::SyntaxError(_) } if name == "file:///a/broken.js"));
}

struct Numbers;
struct NumbersInstance;

impl HostModule for Numbers {
    fn new_module_instance(&self, _rt: &mut Runtime) -> Box<dyn HostInstance> {
        Box::new(NumbersInstance)
    }
}

impl HostInstance for NumbersInstance {
    fn exports(&self) -> Exports {
        Exports::named([("x", 1), ("y", 2)])
    }
}

#[test]
fn test_host_module_derived_default_is_stable() {
    let defaults = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&defaults);

    let fixture = Fixture::new().builtin("spacey/numbers", BuiltinModule::conforming(Numbers));
    fixture.graph(
        "file:///a/main.js",
        ModuleSource::new(move |_, env| {
            captured.lock().push(env.import("spacey/numbers", "default")?);
            captured.lock().push(env.import("spacey/numbers", "default")?);
            let y = env.import("spacey/numbers", "y")?;
            env.export("y", y)
        })
        .requests(["spacey/numbers"])
        .exports(["y"]),
    );

    let mut vu = Vu::new(fixture.resolver());
    let main = vu.run("file:///a/main.js").unwrap();
    assert_eq!(vu.export(&main, "y"), Value::from(2));

    let defaults = defaults.lock();
    let first = defaults[0].as_object().unwrap();
    let second = defaults[1].as_object().unwrap();
    assert!(first.ptr_eq(second));
    assert_eq!(first.keys(), vec!["x", "y"]);
    assert_eq!(first.get("x"), Some(Value::from(1)));
}

#[test]
fn test_plain_builtin_and_namespace_import() {
    let data = Object::new();
    data.set("greeting", "hello");

    let fixture = Fixture::new().builtin("spacey/data", BuiltinModule::plain(data));
    fixture.graph(
        "file:///a/main.js",
        ModuleSource::new(|_, env| {
            let ns = env.namespace("spacey/data")?;
            env.export("ns", ns)?;
            env.export("greeting", env.import("spacey/data", "greeting")?)
        })
        .requests(["spacey/data"])
        .exports(["ns", "greeting"]),
    );

    let mut vu = Vu::new(fixture.resolver());
    let main = vu.run("file:///a/main.js").unwrap();
    assert_eq!(vu.export(&main, "greeting"), Value::from("hello"));
    let ns = vu.export(&main, "ns");
    assert_eq!(ns.get("greeting"), Some(Value::from("hello")));
}

#[test]
fn test_plain_default_is_whole_value() {
    let data = Object::new();
    data.set("default", "prop");
    data.set("x", 1);

    let fixture = Fixture::new().builtin("spacey/plain", BuiltinModule::plain(data));
    fixture.graph(
        "file:///a/main.js",
        ModuleSource::new(|_, env| {
            env.export("whole", env.import("spacey/plain", "default")?)?;
            env.export("x", env.import("spacey/plain", "x")?)
        })
        .requests(["spacey/plain"])
        .exports(["whole", "x"]),
    );

    let mut vu = Vu::new(fixture.resolver());
    let main = vu.run("file:///a/main.js").unwrap();
    let whole = vu.export(&main, "whole");
    assert_eq!(whole.get("default"), Some(Value::from("prop")));
    assert_eq!(whole.get("x"), Some(Value::from(1)));
    assert_eq!(vu.export(&main, "x"), Value::from(1));
}

#[test]
fn test_namespace_is_memoized_after_evaluation() {
    let fixture = Fixture::new();
    fixture.graph(
        "file:///a/main.js",
        ModuleSource::new(|_, env| env.export("v", Value::from(1))).exports(["v"]),
    );

    let mut vu = Vu::new(fixture.resolver());
    let main = vu.run("file:///a/main.js").unwrap();
    let instance = vu.system.instance(&main).unwrap();
    let first = vu.system.namespace_object(&instance);
    let second = vu.system.namespace_object(&instance);
    assert!(first.ptr_eq(&second));
    assert_eq!(first.get("v"), Some(Value::from(1)));
}

#[test]
fn test_undeclared_export_and_missing_import() {
    let fixture = Fixture::new();
    fixture
        .graph(
            "file:///a/writer.js",
            ModuleSource::new(|_, env| env.export("nope", Value::Null)).exports(["v"]),
        )
        .graph("file:///a/lib.js", noop().exports(["v"]))
        .graph(
            "file:///a/reader.js",
            ModuleSource::new(|_, env| env.import("./lib.js", "w").map(|_| ())).requests(["./lib.js"]),
        );

    let mut vu = Vu::new(fixture.resolver());
    let err = vu.run("file:///a/writer.js").unwrap_err();
    assert!(matches!(err, ModuleError::Evaluation(Exception::TypeError(_))));

    let err = vu.run("file:///a/reader.js").unwrap_err();
    match err {
        ModuleError::Evaluation(Exception::SyntaxError(msg)) => {
            assert!(msg.contains("does not provide an export named 'w'"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_records_are_shared_between_runtimes() {
    let runs = Counter::default();
    let body_runs = runs.clone();

    let fixture = Fixture::new();
    fixture.graph("file:///a/main.js", noop().requests(["./lib.js"])).graph(
        "file:///a/lib.js",
        ModuleSource::new(move |_, env| {
            body_runs.hit();
            env.export("n", Value::from(body_runs.get() as f64))
        })
        .exports(["n"]),
    );
    let resolver = fixture.resolver();

    let mut first = Vu::new(resolver.clone());
    let mut second = Vu::new(resolver.clone());
    first.run("file:///a/main.js").unwrap();
    second.run("file:///a/main.js").unwrap();

    let lib = resolver.resolve(resolver.base(), "./lib.js").unwrap();
    assert_eq!(first.export(&lib, "n"), Value::from(1));
    assert_eq!(second.export(&lib, "n"), Value::from(2));
    assert_eq!(runs.get(), 2);
    assert_eq!(fixture.compiler.compile_count(), 2);
}

#[test]
fn test_concurrent_runtimes_share_records() {
    const THREADS: usize = 8;

    let fixture = Fixture::new();
    fixture
        .graph("file:///a/main.js", noop().requests(["./a.js", "./b.js"]))
        .graph("file:///a/a.js", noop().requests(["./b.js"]))
        .graph("file:///a/b.js", noop());
    let resolver = fixture.resolver();
    let barrier = std::sync::Barrier::new(THREADS);

    let records: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let resolver = resolver.clone();
                let barrier = &barrier;
                scope.spawn(move || {
                    let mut vu = Vu::new(resolver.clone());
                    barrier.wait();
                    vu.run("file:///a/main.js").unwrap();
                    ["./main.js", "./a.js", "./b.js"].map(|specifier| {
                        resolver.resolve(resolver.base(), specifier).unwrap()
                    })
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    // the root comes from its bytes; a.js and b.js are each loaded once
    assert_eq!(fixture.loader.load_count(), 2);
    assert_eq!(fixture.compiler.compile_count(), 3);
    for set in &records[1..] {
        for (record, first) in set.iter().zip(&records[0]) {
            assert!(Arc::ptr_eq(record, first));
        }
    }
}

#[test]
fn test_module_runs_once_per_runtime() {
    let runs = Counter::default();
    let body_runs = runs.clone();

    let fixture = Fixture::new();
    fixture.graph(
        "file:///a/main.js",
        ModuleSource::new(move |_, _| {
            body_runs.hit();
            Ok(())
        }),
    );

    let mut vu = Vu::new(fixture.resolver());
    let first = vu.run("file:///a/main.js").unwrap();
    let second = vu.run("file:///a/main.js").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(runs.get(), 1);
}

#[test]
#[should_panic(expected = "top-level await is not supported")]
fn test_top_level_await_is_fatal() {
    let fixture = Fixture::new();
    fixture.graph("file:///a/main.js", noop().top_level_await(true));
    let mut vu = Vu::new(fixture.resolver());
    let _ = vu.run("file:///a/main.js");
}

struct SelfRequiring;
struct Empty;

impl HostModule for SelfRequiring {
    fn new_module_instance(&self, rt: &mut Runtime) -> Box<dyn HostInstance> {
        let _ = common::require(rt, "spacey/loop");
        Box::new(Empty)
    }
}

impl HostInstance for Empty {
    fn exports(&self) -> Exports {
        Exports::default()
    }
}

struct NeedsNumbers;

impl HostModule for NeedsNumbers {
    fn new_module_instance(&self, rt: &mut Runtime) -> Box<dyn HostInstance> {
        let numbers = common::require(rt, "spacey/numbers").unwrap();
        assert_eq!(numbers.get("x"), Some(Value::from(1)));
        Box::new(NumbersInstance)
    }
}

#[test]
fn test_native_instantiation_may_require_others() {
    let fixture = Fixture::new()
        .builtin("spacey/numbers", BuiltinModule::conforming(Numbers))
        .builtin("spacey/needs", BuiltinModule::conforming(NeedsNumbers));
    let mut vu = Vu::new(fixture.resolver());
    let needs = common::require(&mut vu.rt, "spacey/needs").unwrap();
    assert_eq!(needs.get("y"), Some(Value::from(2)));
}

#[test]
#[should_panic(expected = "being built")]
fn test_native_instantiation_requiring_itself_is_fatal() {
    let fixture = Fixture::new().builtin("spacey/loop", BuiltinModule::conforming(SelfRequiring));
    let mut vu = Vu::new(fixture.resolver());
    let _ = common::require(&mut vu.rt, "spacey/loop");
}

#[test]
#[should_panic(expected = "used with")]
fn test_system_is_bound_to_its_runtime() {
    let fixture = Fixture::new();
    fixture.graph("file:///a/main.js", noop());
    let vu = Vu::new(fixture.resolver());
    let mut stranger = Runtime::new();
    let _ = vu.system.run(&mut stranger, common::source("file:///a/main.js"));
}

#[test]
fn test_stdin_root_resolves_against_base() {
    let fixture = Fixture::new();
    fixture.graph("file:///a/lib.js", noop().exports(["v"]));
    let stdin_source = "// piped";
    fixture.compiler.insert(
        stdin_source,
        Program::Module(noop().requests(["./lib.js"])),
    );

    let mut vu = Vu::new(fixture.resolver());
    vu.system
        .run(&mut vu.rt, SourceData::new(Locator::stdin(), stdin_source))
        .unwrap();
    assert_eq!(
        vu.system.imported(),
        vec!["file:///-", "file:///a/lib.js"]
    );
}

#[test]
fn test_run_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("lib")).unwrap();
    std::fs::write(dir.path().join("main.js"), "import { v } from './lib/v.js';").unwrap();
    std::fs::write(dir.path().join("lib/v.js"), "export const v = 7;").unwrap();

    let compiler = ProgramTable::new()
        .with(
            "import { v } from './lib/v.js';",
            Program::Module(
                ModuleSource::new(|_, env| env.export("v", env.import("./lib/v.js", "v")?))
                    .requests(["./lib/v.js"])
                    .exports(["v"]),
            ),
        )
        .with(
            "export const v = 7;",
            Program::Module(ModuleSource::new(|_, env| env.export("v", Value::from(7))).exports(["v"])),
        );
    let base = Locator::from_directory_path(dir.path()).unwrap();
    let resolver = Arc::new(ModuleResolver::new(
        ResolverConfig::default().with_base(base),
        Arc::new(FsLoader::new()),
        Arc::new(compiler),
    ));

    let mut rt = Runtime::new();
    let system = ModuleSystem::new(resolver, &rt);
    let main_path = dir.path().join("main.js");
    let data = std::fs::read(&main_path).unwrap();
    let main = system
        .run(&mut rt, SourceData::new(Locator::from_file_path(&main_path).unwrap(), data))
        .unwrap();
    let instance = system.instance(&main).unwrap();
    assert_eq!(instance.get_binding_value("v"), Value::from(7));
    assert_eq!(system.imported().len(), 2);
}
