//! Host bindings registered on every Rhai engine.

use std::sync::Arc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Position};
use tracing::debug;

use super::context::{ContextHandle, ScriptContext, ScriptLogger};
use crate::core::console::{ColoredConsole, ConsoleLevel, join_args};
use crate::core::serialize::serialize;
use crate::io::process::{ProcessRequest, run_process};

/// Build an engine for one invocation.
///
/// Without a context (loading) `print` and `debug` are silenced and child
/// processes are unavailable. With one, both are routed to the context console.
pub fn build_engine(ctx: Option<&Arc<ScriptContext>>) -> Engine {
    let mut engine = Engine::new();
    register_context(&mut engine);
    register_console(&mut engine);
    register_logger(&mut engine);

    match ctx {
        Some(ctx) => {
            let console = ctx.console_or_stdout();
            let print_console = console.clone();
            engine.on_print(move |text| print_console.emit_text(ConsoleLevel::Log, text));

            engine.on_debug(move |text, _source, _pos| {
                console.emit_text(ConsoleLevel::Debug, text);
            });
            register_exec(&mut engine, ctx);
        }
        None => {
            engine.on_print(|_| {});
            engine.on_debug(|_, _, _| {});
        }
    }
    engine
}

fn register_context(engine: &mut Engine) {
    engine
        .register_type_with_name::<ContextHandle>("Context")
        .register_get("env", |c: &mut ContextHandle| c.0.env_map())
        .register_get("tmp_dir", |c: &mut ContextHandle| {
            c.0.tmp_dir.to_string_lossy().into_owned()
        })
        .register_get("config_path", |c: &mut ContextHandle| {
            c.0.config_path
                .as_ref()
                .map_or(Dynamic::UNIT, |p| Dynamic::from(p.to_string_lossy().into_owned()))
        })
        .register_get("params", |c: &mut ContextHandle| -> Map { c.0.params.clone() })
        .register_get("script", |c: &mut ContextHandle| c.0.script_name.clone())
        .register_get("console", |c: &mut ContextHandle| c.0.console_or_stdout())
        .register_get("log", |c: &mut ContextHandle| c.0.log.clone());
}

/// Script-side method name for a level. `debug` is a Rhai keyword, so that
/// level is spelled `dbg`.
fn level_method(level: ConsoleLevel) -> &'static str {
    match level {
        ConsoleLevel::Debug => "dbg",
        other => other.as_str(),
    }
}

fn register_console(engine: &mut Engine) {
    engine.register_type_with_name::<ColoredConsole>("Console");
    for level in ConsoleLevel::ALL {
        register_variadic(engine, level_method(level), move |c: &mut ColoredConsole, args| {
            c.emit(level, args);
        });
    }
}

fn register_logger(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptLogger>("Logger");
    register_variadic(engine, "info", |l: &mut ScriptLogger, args| l.info(&join_args(args)));
    register_variadic(engine, "warn", |l: &mut ScriptLogger, args| l.warn(&join_args(args)));
    register_variadic(engine, "error", |l: &mut ScriptLogger, args| {
        l.error(&join_args(args));
    });
    register_variadic(engine, level_method(ConsoleLevel::Debug), |l: &mut ScriptLogger, args| {
        l.debug(&join_args(args));
    });
}

/// Register `name` as a method taking zero to four arguments of any type.
fn register_variadic<T, F>(engine: &mut Engine, name: &'static str, f: F)
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&mut T, &[Dynamic]) + Clone + Send + Sync + 'static,
{
    let g = f.clone();
    engine.register_fn(name, move |this: &mut T| g(this, &[]));
    let g = f.clone();
    engine.register_fn(name, move |this: &mut T, a: Dynamic| g(this, &[a]));
    let g = f.clone();
    engine.register_fn(name, move |this: &mut T, a: Dynamic, b: Dynamic| g(this, &[a, b]));
    let g = f.clone();
    engine.register_fn(name, move |this: &mut T, a: Dynamic, b: Dynamic, c: Dynamic| {
        g(this, &[a, b, c])
    });
    engine.register_fn(
        name,
        move |this: &mut T, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| f(this, &[a, b, c, d]),
    );
}

fn register_exec(engine: &mut Engine, ctx: &Arc<ScriptContext>) {
    let c = Arc::clone(ctx);
    engine.register_fn("exec", move |cmd: &str| exec(&c, cmd, &[]));
    let c = Arc::clone(ctx);
    engine.register_fn("exec", move |cmd: &str, args: Array| exec(&c, cmd, &args));
    let c = Arc::clone(ctx);
    engine.register_fn("exec_output", move |cmd: &str| exec_output(&c, cmd, &[]));
    let c = Arc::clone(ctx);
    engine.register_fn("exec_output", move |cmd: &str, args: Array| {
        exec_output(&c, cmd, &args)
    });
}

struct ExecResult {
    code: i64,
    stdout: String,
    stderr: String,
}

fn spawn(ctx: &ScriptContext, cmd: &str, args: &[Dynamic]) -> Result<ExecResult, Box<EvalAltResult>> {
    let args: Vec<String> = args.iter().map(serialize).collect();
    debug!(script = %ctx.script_name, program = cmd, "exec");
    let output = run_process(&ProcessRequest {
        program: cmd,
        args: &args,
        env: &ctx.env,
        timeout: ctx.exec.timeout,
        output_limit_bytes: ctx.exec.output_limit_bytes,
    })
    .map_err(|err| exec_error(format!("{err:#}")))?;
    if output.timed_out {
        return Err(exec_error(format!("`{cmd}` timed out")));
    }
    Ok(ExecResult {
        code: output.code(),
        stdout: output.stdout_text(),
        stderr: output.stderr_text(),
    })
}

/// Run a child process, forwarding its output to the console. Returns the exit code.
fn exec(ctx: &ScriptContext, cmd: &str, args: &[Dynamic]) -> Result<i64, Box<EvalAltResult>> {
    let result = spawn(ctx, cmd, args)?;
    let console = ctx.console_or_stdout();
    forward_lines(&console, ConsoleLevel::Log, &result.stdout);
    forward_lines(&console, ConsoleLevel::Warn, &result.stderr);
    Ok(result.code)
}

/// Run a child process and return its stdout. A non-zero exit is an error.
fn exec_output(
    ctx: &ScriptContext,
    cmd: &str,
    args: &[Dynamic],
) -> Result<String, Box<EvalAltResult>> {
    let result = spawn(ctx, cmd, args)?;
    forward_lines(&ctx.console_or_stdout(), ConsoleLevel::Warn, &result.stderr);
    if result.code != 0 {
        return Err(exec_error(format!(
            "`{cmd}` exited with status {}",
            result.code
        )));
    }
    Ok(result.stdout)
}

fn forward_lines(console: &ColoredConsole, level: ConsoleLevel, text: &str) {
    for line in text.lines() {
        console.emit_text(level, line);
    }
}

fn exec_error(message: String) -> Box<EvalAltResult> {
    let mut map = Map::new();
    map.insert("name".into(), Dynamic::from("ExecError"));
    map.insert("message".into(), Dynamic::from(message));
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from_map(map), Position::NONE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::core::console::{BLUE, DIM, RESET};
    use crate::core::environment::EnvMap;
    use crate::script::ExecSettings;

    fn context(lines: &Arc<Mutex<Vec<String>>>) -> Arc<ScriptContext> {
        let sink = Arc::clone(lines);
        Arc::new(ScriptContext {
            script_name: "host-test".to_string(),
            env: EnvMap::from([("TOKEN".to_string(), "abc".to_string())]),
            tmp_dir: PathBuf::from("/tmp/scriptor-test"),
            config_path: None,
            params: Map::new(),
            console: Some(ColoredConsole::from_fn(move |line| {
                sink.lock().expect("lock").push(line.to_string());
            })),
            log: ScriptLogger::new("host-test"),
            exec: ExecSettings::default(),
        })
    }

    fn run(source: &str, ctx: &Arc<ScriptContext>) -> Dynamic {
        let engine = build_engine(Some(ctx));
        let mut scope = rhai::Scope::new();
        scope.push("ctx", ContextHandle::new(ctx));
        engine
            .eval_with_scope::<Dynamic>(&mut scope, source)
            .expect("eval")
    }

    #[test]
    fn context_properties_are_visible() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(&lines);
        let value = run(r#"ctx.env["TOKEN"] + ":" + ctx.tmp_dir"#, &ctx);
        assert_eq!(value.into_string().expect("string"), "abc:/tmp/scriptor-test");
        assert!(run("ctx.config_path", &ctx).is_unit());
    }

    #[test]
    fn console_methods_accept_several_arguments() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(&lines);
        run(r#"ctx.console.info("a", 1, [true]); ctx.console.log()"#, &ctx);
        let lines = lines.lock().expect("lock");
        assert_eq!(*lines, vec![format!("{BLUE}a 1 [true]{RESET}"), String::new()]);
    }

    #[test]
    fn print_and_debug_reach_the_console() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(&lines);
        run(
            r#"print("plain"); ctx.console.dbg("x", 2); ctx.log.dbg("hidden"); debug(5)"#,
            &ctx,
        );
        let lines = lines.lock().expect("lock");
        assert_eq!(
            *lines,
            vec![
                "plain".to_string(),
                format!("{DIM}x 2{RESET}"),
                format!("{DIM}5{RESET}"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn exec_passes_merged_env_to_children() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(&lines);
        let out = run(r#"exec_output("sh", ["-c", "printf %s $TOKEN"])"#, &ctx);
        assert_eq!(out.into_string().expect("string"), "abc");

        let code = run(r#"exec("sh", ["-c", "echo one; exit 3"])"#, &ctx);
        assert_eq!(code.as_int().expect("int"), 3);
        assert_eq!(lines.lock().expect("lock").as_slice(), ["one".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn exec_output_fails_on_non_zero_exit() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(&lines);
        let engine = build_engine(Some(&ctx));
        let err = engine
            .eval::<Dynamic>(r#"exec_output("sh", ["-c", "exit 2"])"#)
            .unwrap_err();
        let failure = crate::error::ScriptFailure::from_eval(&err);
        assert_eq!(failure.name, "ExecError");
        assert!(failure.message.contains("status 2"));
    }
}
