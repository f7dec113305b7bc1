//! Registration: compiling declarations and merging them into the tree.

mod common;

use std::sync::Arc;

use cmdtree_core::stream::MutableStringStream;
use cmdtree_core::{
    CommandEngine, CommandError, CommandSpec, ExecutionContext, InvalidReason, ParamSpec,
    RegistrationError, Resolver, Settings, Value,
};
use common::TestActor;

fn empty() -> CommandEngine<TestActor> {
    common::builder().build()
}

// ─── Declaration errors ──────────────────────────────────────────────────────

#[test]
fn handler_is_required() {
    let err = empty().register(CommandSpec::new("noop")).unwrap_err();
    assert_eq!(
        err,
        RegistrationError::MissingHandler {
            path: "noop".into()
        }
    );
}

#[test]
fn malformed_paths() {
    for path in ["", "<player> kick", "give <item", "give <>"] {
        let err = empty()
            .register(CommandSpec::new(path).run(|_| {}))
            .unwrap_err();
        assert!(
            matches!(err, RegistrationError::InvalidPath { .. }),
            "{path:?}: {err:?}"
        );
    }
}

#[test]
fn duplicate_parameter_names() {
    let err = empty()
        .register(CommandSpec::new("pair <a> <a>").run(|_| {}))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateParameter { ref name, .. } if name == "a"));

    let err = empty()
        .register(
            CommandSpec::new("pair")
                .param(ParamSpec::new::<i32>("a"))
                .param(ParamSpec::new::<String>("a"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateParameter { .. }));
}

#[test]
fn flags_cannot_appear_in_the_path() {
    let err = empty()
        .register(
            CommandSpec::new("ban <reason>")
                .param(ParamSpec::new::<String>("reason").flag())
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidPath { .. }));
}

#[test]
fn optional_parameters_come_last() {
    let err = empty()
        .register(
            CommandSpec::new("area")
                .param(ParamSpec::new::<i32>("width").optional())
                .param(ParamSpec::new::<i32>("height"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "command 'area': required parameter 'height' follows optional parameter 'width'"
    );
}

#[test]
fn greedy_parameter_must_be_last() {
    let err = empty()
        .register(
            CommandSpec::new("note <text> <to>")
                .param(ParamSpec::new::<String>("text").greedy())
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidOrder { .. }));
}

#[test]
fn flag_names_must_be_unique() {
    let err = empty()
        .register(
            CommandSpec::new("build")
                .param(ParamSpec::switch("verbose").shorthand('v'))
                .param(ParamSpec::switch("version").shorthand('v'))
                .run(|_| {}),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::DuplicateFlag {
            path: "build".into(),
            flag: "v".into(),
        }
    );
}

#[test]
fn flag_names_must_start_with_a_letter() {
    let err = empty()
        .register(
            CommandSpec::new("build")
                .param(ParamSpec::switch("9lives"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidPath { .. }));
}

#[test]
fn unknown_type_has_no_resolver() {
    let err = empty()
        .register(
            CommandSpec::new("wait")
                .param(ParamSpec::new::<std::time::Duration>("delay"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::NoResolver { ref name, .. } if name == "delay"));
}

#[test]
fn resolver_kind_must_match_parameter_kind() {
    let mut engine = common::builder()
        .resolver::<i32>(Resolver::context(|_: &ExecutionContext<TestActor>| {
            Ok(Value::new(0i32))
        }))
        .build();
    let err = engine
        .register(
            CommandSpec::new("count")
                .param(ParamSpec::new::<i32>("n"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::WrongResolverKind {
            expected: "value",
            ..
        }
    ));
}

// ─── Tree merging ────────────────────────────────────────────────────────────

#[test]
fn duplicate_command_is_rejected() {
    let mut engine = common::engine();
    let err = engine
        .register(CommandSpec::new("team add <name>").run(|_| {}))
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::DuplicateCommand {
            path: "team add <name>".into()
        }
    );
}

#[test]
fn same_type_siblings_are_ambiguous() {
    let mut engine = common::engine();
    let err = engine
        .register(CommandSpec::new("msg <someone>").run(|_| {}))
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::AmbiguousParameters {
            path: "msg".into(),
            existing: "target".into(),
            new: "someone".into(),
        }
    );
}

#[test]
fn shared_parameters_must_agree() {
    let mut engine = common::engine();
    let err = engine
        .register(
            CommandSpec::new("give <selector> all")
                .param(ParamSpec::new::<String>("selector").permission("give.others"))
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::ConflictingParameter { ref name, .. } if name == "selector"
    ));
}

#[test]
fn shared_prefixes_merge() {
    let mut engine = common::engine();
    engine
        .register(CommandSpec::new("give <selector> all").run(|inv| inv.reply("everything")))
        .unwrap();
    let actor = TestActor::new("alice");
    engine.dispatch(Arc::clone(&actor), "give @s all").unwrap();
    engine.dispatch(Arc::clone(&actor), "give @s dirt").unwrap();
    assert_eq!(actor.replies(), ["everything", "gave 1 dirt to @s"]);
}

#[test]
fn category_with_default_cannot_mix_children() {
    let mut engine = common::engine();
    let err = engine
        .register(CommandSpec::new("team <color>").run(|_| {}))
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::CategoryConflict {
            path: "team".into()
        }
    );

    // The failed registration left the tree as it was.
    let actor = TestActor::new("alice");
    engine.dispatch(Arc::clone(&actor), "team add red").unwrap();
    assert_eq!(actor.replies(), ["added red"]);
}

#[test]
fn leading_literal_limit() {
    let settings = Settings {
        max_leading_literals: 2,
        ..Settings::default()
    };
    let mut engine = common::builder().settings(settings).build();
    engine
        .register(CommandSpec::new("a b <c>").run(|_| {}))
        .unwrap();
    let err = engine
        .register(CommandSpec::new("a b c").run(|_| {}))
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::TooManyLeadingLiterals {
            path: "a b c".into(),
            max: 2,
        }
    );
}

#[test]
fn alias_failure_registers_nothing() {
    let mut engine = empty();
    engine
        .register(CommandSpec::new("kick <player>").run(|_| {}))
        .unwrap();
    let err = engine
        .register(CommandSpec::new("boot <player>").alias("kick").run(|_| {}))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateCommand { .. }));

    let actor = TestActor::new("alice");
    let failure = engine.dispatch(Arc::clone(&actor), "boot bob").unwrap_err();
    assert!(matches!(failure.error, CommandError::UnknownCommand { .. }));
}

#[test]
fn aliases_may_not_declare_parameters() {
    let err = empty()
        .register(
            CommandSpec::new("teleport <target>")
                .alias("tp <where>")
                .run(|_| {}),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidPath { .. }));
}

// ─── Custom resolvers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coords(i32, i32);

fn coords(
    input: &mut MutableStringStream,
    _: &ExecutionContext<TestActor>,
) -> Result<Value, CommandError> {
    let text = input.read_unquoted_string();
    let parsed = text
        .split_once(',')
        .and_then(|(x, y)| Some(Coords(x.parse().ok()?, y.parse().ok()?)));
    parsed.map(Value::new).ok_or_else(|| {
        CommandError::invalid_value("at", text.clone(), InvalidReason::Custom("expected x,y".into()))
    })
}

#[test]
fn custom_type_resolver() {
    let mut engine = common::builder()
        .resolver::<Coords>(Resolver::value(coords))
        .build();
    engine
        .register(
            CommandSpec::new("mark")
                .param(ParamSpec::new::<Coords>("at"))
                .run(|inv| {
                    let Coords(x, y) = inv.get::<Coords>("at").copied().unwrap_or(Coords(0, 0));
                    inv.reply(&format!("marked {x}/{y}"));
                }),
        )
        .unwrap();
    let actor = TestActor::new("alice");
    engine.dispatch(Arc::clone(&actor), "mark 3,-4").unwrap();
    assert_eq!(actor.replies(), ["marked 3/-4"]);

    let failure = engine.dispatch(Arc::clone(&actor), "mark north").unwrap_err();
    assert_eq!(failure.error.to_string(), "invalid at 'north': expected x,y");
}

#[test]
fn per_parameter_resolver_overrides_the_type() {
    let mut engine = empty();
    engine
        .register(
            CommandSpec::new("shout")
                .param(ParamSpec::new::<String>("word").resolver(Resolver::value(
                    |input: &mut MutableStringStream, _: &ExecutionContext<TestActor>| {
                        Ok(Value::new(input.read_unquoted_string().to_uppercase()))
                    },
                )))
                .run(|inv| inv.reply(inv.get::<String>("word").map_or("", String::as_str))),
        )
        .unwrap();
    let actor = TestActor::new("alice");
    engine.dispatch(Arc::clone(&actor), "shout hey").unwrap();
    assert_eq!(actor.replies(), ["HEY"]);
}

// ─── Unregistration ──────────────────────────────────────────────────────────

fn paths(engine: &CommandEngine<TestActor>) -> Vec<String> {
    engine.commands().into_iter().map(|c| c.path).collect()
}

#[test]
fn unregister_removes_the_whole_category() {
    let mut engine = common::engine();
    assert!(engine.unregister("team"));

    assert!(!paths(&engine).iter().any(|p| p.starts_with("team")));
    let actor = TestActor::new("alice");
    let failure = engine.dispatch(Arc::clone(&actor), "team add red").unwrap_err();
    assert!(matches!(failure.error, CommandError::UnknownCommand { .. }));
    engine.dispatch(Arc::clone(&actor), "say still here").unwrap();
    assert_eq!(actor.replies(), ["still here"]);
}

#[test]
fn unregister_sub_path_keeps_siblings() {
    let mut engine = common::engine();
    assert!(engine.unregister("team add"));

    let paths = paths(&engine);
    assert!(!paths.iter().any(|p| p == "team add <name>"));
    assert!(paths.iter().any(|p| p == "team remove <name>"));
    assert!(paths.iter().any(|p| p == "team"));
}

#[test]
fn unregister_unknown_path_is_a_no_op() {
    let mut engine = common::engine();
    let before = engine.commands().len();
    assert!(!engine.unregister("nope"));
    assert!(!engine.unregister("team rename"));
    assert!(!engine.unregister("   "));
    assert_eq!(engine.commands().len(), before);
}

#[test]
fn unregister_takes_aliases_along_and_allows_reregistering() {
    let warp = || {
        CommandSpec::new("teleport <target>")
            .alias("warp")
            .run(|inv| inv.reply("moved"))
    };
    let mut engine = empty();
    engine.register(warp()).unwrap();
    assert_eq!(paths(&engine), ["teleport <target>", "warp <target>"]);

    assert!(engine.unregister("teleport"));
    assert!(engine.commands().is_empty());
    assert!(engine.tree().root().is_leaf());

    engine.register(warp()).unwrap();
    let actor = TestActor::new("alice");
    engine.dispatch(Arc::clone(&actor), "warp home").unwrap();
    assert_eq!(actor.replies(), ["moved"]);
}

#[test]
fn unregister_all_empties_the_tree() {
    let mut engine = common::engine();
    engine.unregister_all();
    assert!(engine.commands().is_empty());
    engine
        .register(CommandSpec::new("say").run(|inv| inv.reply("ok")))
        .unwrap();
    assert_eq!(paths(&engine), ["say"]);
}

// ─── Introspection ───────────────────────────────────────────────────────────

#[test]
fn command_info_lists_paths_and_usage() {
    let engine = common::engine();
    let commands = engine.commands();
    let give = commands
        .iter()
        .find(|c| c.path.starts_with("give"))
        .unwrap();
    assert_eq!(give.path, "give <selector> <item> <amount>");
    assert_eq!(give.usage, "give <selector> <item> [amount] [--silent]");
    assert_eq!(give.description.as_deref(), Some("Give items to players"));

    let ban = commands.iter().find(|c| c.path.starts_with("ban")).unwrap();
    assert_eq!(ban.usage, "ban <player> --reason <reason> [--days <days>]");
    assert_eq!(ban.permission.as_deref(), Some("mod.ban"));

    assert!(commands.iter().any(|c| c.path == "vanish" && c.secret));
}

#[test]
fn command_info_serializes() {
    let engine = common::engine();
    let json = serde_json::to_value(engine.commands()).unwrap();
    let say = json
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["path"] == "say <message>")
        .unwrap();
    assert_eq!(say["usage"], "say <message>");
    assert_eq!(say["secret"], false);
    assert!(say.get("permission").is_none());
    assert!(say.get("cooldown_ms").is_none());
}
