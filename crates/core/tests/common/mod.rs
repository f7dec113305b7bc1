//! Shared test helpers for `cmdtree_core` integration tests.

#![allow(unreachable_pub)]

use std::sync::{Arc, Mutex};

use cmdtree_core::{
    Actor, CommandEngine, CommandEnum, CommandSpec, EngineBuilder, HandlerError, ParamSpec,
    ParamType, Value,
};

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Records everything the engine sends back.
#[derive(Debug, Default)]
pub struct TestActor {
    pub name: String,
    pub permissions: Vec<String>,
    replies: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl TestActor {
    /// An actor with no permissions.
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_permissions(name, &[])
    }

    /// An actor holding `permissions`.
    pub fn with_permissions(name: &str, permissions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            permissions: permissions.iter().map(ToString::to_string).collect(),
            ..Self::default()
        })
    }

    /// Messages sent with `reply`, in order.
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }

    /// Messages sent with `error`, in order.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Actor for TestActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn reply(&self, message: &str) {
        self.replies.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Permission reader backed by `TestActor::permissions`.
pub fn has_permission(actor: &TestActor, permission: &str) -> bool {
    actor.permissions.iter().any(|p| p == permission)
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
}

impl CommandEnum for GameMode {
    fn constants() -> &'static [Self] {
        &[Self::Survival, Self::Creative, Self::Adventure]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Adventure => "adventure",
        }
    }
}

/// Builder with the test permission reader installed.
#[allow(dead_code)]
pub fn builder() -> EngineBuilder<TestActor> {
    CommandEngine::builder().permission_reader(has_permission)
}

/// `give <selector> <item> [amount] [--silent]`, replying with what was given.
#[allow(dead_code)]
pub fn give_command() -> CommandSpec<TestActor> {
    CommandSpec::new("give <selector> <item>")
        .description("Give items to players")
        .param(ParamSpec::new::<String>("item").suggest_values(["diamond", "dirt", "diorite"]))
        .param(ParamSpec::new::<i32>("amount").default_value("1").range(1.0, 64.0))
        .param(ParamSpec::switch("silent").shorthand('s'))
        .handler(|inv| {
            if inv.get::<bool>("silent") == Some(&true) {
                return Ok(None);
            }
            let selector = inv.get::<String>("selector").cloned().unwrap_or_default();
            let item = inv.get::<String>("item").cloned().unwrap_or_default();
            let amount = inv.get::<i32>("amount").copied().unwrap_or_default();
            Ok(Some(Value::new(format!("gave {amount} {item} to {selector}"))))
        })
}

/// An engine with a representative command set registered.
#[allow(dead_code)]
pub fn engine() -> CommandEngine<TestActor> {
    engine_with(builder())
}

/// Like [`engine`], but starting from `builder`.
#[allow(dead_code)]
pub fn engine_with(builder: EngineBuilder<TestActor>) -> CommandEngine<TestActor> {
    let mut engine = builder.build();
    let specs = [
        give_command(),
        CommandSpec::new("say")
            .param(ParamSpec::new::<String>("message").greedy())
            .handler(|inv| Ok(inv.value("message").cloned())),
        CommandSpec::new("msg <target> <text>").handler(|inv| {
            let text = inv.get::<String>("text").cloned().unwrap_or_default();
            Ok(Some(Value::new(text)))
        }),
        CommandSpec::new("team").handler(|_| Ok(Some(Value::new("team help".to_string())))),
        CommandSpec::new("team add <name>").run(|inv| {
            inv.reply(&format!("added {}", inv.get::<String>("name").map_or("", String::as_str)));
        }),
        CommandSpec::new("team remove <name>").run(|inv| {
            inv.reply(&format!("removed {}", inv.get::<String>("name").map_or("", String::as_str)));
        }),
        CommandSpec::new("tp")
            .param(ParamSpec::new::<i32>("x"))
            .run(|inv| inv.reply(&format!("x={}", inv.get::<i32>("x").copied().unwrap_or_default()))),
        CommandSpec::new("tp <target>").run(|inv| {
            inv.reply(&format!("to {}", inv.get::<String>("target").map_or("", String::as_str)));
        }),
        CommandSpec::new("gamemode")
            .param(ParamSpec::of("mode", ParamType::enumeration::<GameMode>()))
            .run(|inv| {
                let mode = inv.get::<GameMode>("mode").map_or("?", |m| m.name());
                inv.reply(mode);
            }),
        CommandSpec::new("sum")
            .param(ParamSpec::of("numbers", ParamType::list_of(ParamType::of::<i32>())))
            .handler(|inv| {
                let numbers = inv
                    .value("numbers")
                    .and_then(|v| v.to_vec::<i32>())
                    .unwrap_or_default();
                Ok(Some(Value::new(numbers.iter().sum::<i32>().to_string())))
            }),
        CommandSpec::new("ban <player>")
            .permission("mod.ban")
            .param(ParamSpec::new::<String>("reason").flag().shorthand('r'))
            .param(ParamSpec::new::<i32>("days").flag().shorthand('d').default_value("7"))
            .run(|inv| {
                let player = inv.get::<String>("player").map_or("", String::as_str);
                let reason = inv.get::<String>("reason").map_or("", String::as_str);
                let days = inv.get::<i32>("days").copied().unwrap_or_default();
                inv.reply(&format!("banned {player} for {days}d: {reason}"));
            }),
        CommandSpec::new("explode").handler(|_| Err(HandlerError::failed("disk on fire"))),
        CommandSpec::new("vanish").secret().run(|inv| inv.reply("poof")),
    ];
    for spec in specs {
        engine.register(spec).expect("fixture command registers");
    }
    engine
}
