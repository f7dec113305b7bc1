//! Tab completion over the merged tree.

mod common;

use std::sync::Arc;

use cmdtree_core::{
    Actor, CommandSpec, ExecutionContext, ParamSpec, Settings, StaticSuggestions, UnionSuggestions,
};
use common::TestActor;

#[test]
fn root_lists_visible_commands() {
    let engine = common::engine();
    let guest = TestActor::new("guest");
    assert_eq!(
        engine.suggest(guest, ""),
        ["give", "say", "msg", "team", "tp", "gamemode", "sum", "explode"]
    );

    let moderator = TestActor::with_permissions("mod", &["mod.ban"]);
    assert!(engine.suggest(moderator, "").contains(&"ban".to_string()));
}

#[test]
fn full_candidate_set_is_returned_unfiltered() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert_eq!(
        engine.suggest(actor, "give @s di"),
        ["diamond", "dirt", "diorite"]
    );
}

#[test]
fn tab_separated_input_completes() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert_eq!(
        engine.suggest(Arc::clone(&actor), "give\t@s di"),
        ["diamond", "dirt", "diorite"]
    );
    assert_eq!(engine.suggest(actor, "team\t"), ["add", "remove"]);
}

#[test]
fn subcommands_after_a_category() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(actor, "team "), ["add", "remove"]);
}

#[test]
fn enum_constants() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert_eq!(
        engine.suggest(actor, "gamemode c"),
        ["survival", "creative", "adventure"]
    );
}

#[test]
fn flag_names_after_a_dash() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert_eq!(
        engine.suggest(Arc::clone(&actor), "give @s diamond -"),
        ["--silent", "-s"]
    );
    // Flags already given are not offered again.
    assert!(engine.suggest(actor, "give @s diamond -s -").is_empty());
}

#[test]
fn secret_commands_are_hidden() {
    let engine = common::engine();
    let actor = TestActor::new("alice");
    assert!(!engine.suggest(Arc::clone(&actor), "").contains(&"vanish".to_string()));
    assert!(engine.suggest(actor, "vanish ").is_empty());
}

#[test]
fn commands_without_permission_are_hidden() {
    let engine = common::engine();
    let guest = TestActor::new("guest");
    assert!(engine.suggest(guest, "ban bob -").is_empty());

    let moderator = TestActor::with_permissions("mod", &["mod.ban"]);
    assert_eq!(
        engine.suggest(moderator, "ban bob -"),
        ["--reason", "-r", "--days", "-d"]
    );
}

#[test]
fn max_suggestions_caps_the_output() {
    let settings = Settings {
        max_suggestions: 2,
        ..Settings::default()
    };
    let engine = common::engine_with(common::builder().settings(settings));
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(actor, ""), ["give", "say"]);
}

#[test]
fn value_of_a_flag() {
    let mut engine = common::builder().build();
    engine
        .register(
            CommandSpec::new("mute <player>")
                .param(
                    ParamSpec::new::<String>("duration")
                        .flag()
                        .suggest_values(["1h", "1d"]),
                )
                .run(|_| {}),
        )
        .unwrap();
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(actor, "mute bob --duration "), ["1h", "1d"]);
}

#[test]
fn union_of_static_and_dynamic_providers() {
    let mut engine = common::builder().build();
    let targets = UnionSuggestions::new()
        .with(StaticSuggestions::new(["@a", "@p"]))
        .with(|ctx: &ExecutionContext<TestActor>| vec![ctx.actor().name().to_string()]);
    engine
        .register(
            CommandSpec::new("kill")
                .param(ParamSpec::new::<String>("target").suggest(targets))
                .run(|_| {}),
        )
        .unwrap();
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(actor, "kill "), ["@a", "@p", "alice"]);
}

#[test]
fn providers_see_earlier_arguments() {
    let mut engine = common::builder().build();
    engine
        .register(
            CommandSpec::new("warp <world> <spot>")
                .param(ParamSpec::new::<String>("spot").suggest(
                    |ctx: &ExecutionContext<TestActor>| match ctx.get::<String>("world") {
                        Some(world) if world == "nether" => vec!["fortress".to_string()],
                        _ => vec!["village".to_string()],
                    },
                ))
                .run(|_| {}),
        )
        .unwrap();
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(Arc::clone(&actor), "warp nether "), ["fortress"]);
    assert_eq!(engine.suggest(actor, "warp overworld f"), ["village"]);
}

#[test]
fn type_wide_suggestions() {
    let builder = common::builder().suggestions_for::<i32>(StaticSuggestions::new(["1", "64"]));
    let engine = common::engine_with(builder);
    let actor = TestActor::new("alice");
    assert_eq!(engine.suggest(actor, "give @s diamond "), ["1", "64"]);
}

#[test]
fn parameter_permission_hides_its_suggestions() {
    let mut engine = common::builder().build();
    engine
        .register(
            CommandSpec::new("heal")
                .param(
                    ParamSpec::new::<String>("target")
                        .optional()
                        .permission("heal.others")
                        .suggest_values(["bob"]),
                )
                .run(|_| {}),
        )
        .unwrap();
    assert!(engine.suggest(TestActor::new("alice"), "heal ").is_empty());
    let medic = TestActor::with_permissions("medic", &["heal.others"]);
    assert_eq!(engine.suggest(medic, "heal "), ["bob"]);
}

#[test]
fn duplicates_are_removed() {
    let mut engine = common::builder().build();
    engine
        .register(
            CommandSpec::new("pick")
                .param(ParamSpec::new::<String>("color").suggest_values(["red", "blue", "red"]))
                .run(|_| {}),
        )
        .unwrap();
    assert_eq!(engine.suggest(TestActor::new("alice"), "pick "), ["red", "blue"]);
}
