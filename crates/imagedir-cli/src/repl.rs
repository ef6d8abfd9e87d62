//! REPL – interactive shell around one image-dir camera.
//!
//! Supported slash-commands:
//!   /help            – show this list
//!   /next [mime]     – fetch the image under the cursor
//!   /index <n>       – fetch position n (wrapped)
//!   /jog <n>         – fetch relative to the cursor
//!   /reset           – fetch the first image
//!   /set <json>      – move the cursor without fetching
//!   /images [names…] – batch fetch, filtered by source name
//!   /save <path>     – fetch and write the bytes to a file
//!   /props           – show camera properties
//!   /schema          – print the attribute JSON schema
//!   /reload          – re-read the config file and reconfigure
//!   /quit | /exit    – exit the shell

use colored::Colorize;
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;
use tracing::warn;

use imagedir_hal::{Attributes, Camera, ImageDirConfig, ResourceRegistry, image_dir};
use imagedir_types::CameraError;

use crate::config::{self, Config};

/// A parsed slash-command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Next(Option<String>),
    Index(i64),
    Jog(i64),
    Reset,
    Set(Attributes),
    Images(Vec<String>),
    Save(PathBuf),
    Props,
    Schema,
    Reload,
    Quit,
}

impl Command {
    /// Parse one input line. Errors are user-facing messages.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "/help" => Ok(Command::Help),
            "/next" => Ok(Command::Next((!rest.is_empty()).then(|| rest.to_string()))),
            "/index" => parse_int(rest, "/index <n>").map(Command::Index),
            "/jog" => parse_int(rest, "/jog <n>").map(Command::Jog),
            "/reset" => Ok(Command::Reset),
            "/set" => {
                let raw = if rest.is_empty() { "{}" } else { rest };
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(map)) => Ok(Command::Set(map)),
                    Ok(_) => Err("usage: /set <json object>".to_string()),
                    Err(e) => Err(format!("invalid JSON: {e}")),
                }
            }
            "/images" => Ok(Command::Images(
                rest.split_whitespace().map(str::to_string).collect(),
            )),
            "/save" if !rest.is_empty() => Ok(Command::Save(PathBuf::from(rest))),
            "/save" => Err("usage: /save <path>".to_string()),
            "/props" => Ok(Command::Props),
            "/schema" => Ok(Command::Schema),
            "/reload" => Ok(Command::Reload),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: '{other}'")),
        }
    }
}

fn parse_int(raw: &str, usage: &str) -> Result<i64, String> {
    raw.parse::<i64>().map_err(|_| format!("usage: {usage}"))
}

/// Runtime state behind the prompt.
pub struct Shell {
    runtime: Runtime,
    registry: ResourceRegistry,
    config: Config,
}

impl Shell {
    /// Register the image-dir model and try to bring the configured camera up.
    ///
    /// A camera that fails to configure is reported; `/reload` retries.
    pub fn new(runtime: Runtime, config: Config) -> Self {
        let mut registry = ResourceRegistry::new();
        registry.register_model(image_dir::model(), image_dir::registration());
        let mut shell = Self {
            runtime,
            registry,
            config,
        };
        shell.bring_up();
        shell
    }

    fn bring_up(&mut self) {
        let attrs = self.config.attributes();
        let result = match self.registry.get(&self.config.name) {
            Some(_) => self
                .runtime
                .block_on(self.registry.reconfigure(&self.config.name, &attrs)),
            None => self
                .registry
                .create(&image_dir::model(), &self.config.name, &attrs)
                .map(|_| ()),
        };
        match result {
            Ok(()) => println!(
                "  {} camera {} serving {}",
                "✓".green().bold(),
                self.config.name.bold(),
                self.config.camera.resolved_dir().display().to_string().yellow()
            ),
            Err(e) => print_error(&e),
        }
    }

    fn camera(&self) -> Result<Arc<dyn Camera>, CameraError> {
        self.registry.get(&self.config.name).ok_or_else(|| {
            CameraError::InvalidRequest(format!(
                "camera '{}' is not configured; fix the config and run /reload",
                self.config.name
            ))
        })
    }

    /// Execute one command. Returns `false` when the shell should exit.
    pub fn execute(&mut self, command: Command) -> bool {
        let result = match command {
            Command::Help => {
                cmd_help();
                Ok(())
            }
            Command::Next(mime) => self.fetch(mime.as_deref(), Attributes::new()),
            Command::Index(n) => self.fetch(None, directive("index", json!(n))),
            Command::Jog(n) => self.fetch(None, directive("index_jog", json!(n))),
            Command::Reset => self.fetch(None, directive("index_reset", json!(true))),
            Command::Set(set) => self.set(set),
            Command::Images(names) => self.images(&names),
            Command::Save(path) => self.save(&path),
            Command::Props => self.props(),
            Command::Schema => {
                print_json(&json!(schemars::schema_for!(ImageDirConfig)));
                Ok(())
            }
            Command::Reload => {
                self.reload();
                Ok(())
            }
            Command::Quit => return false,
        };
        if let Err(e) = result {
            print_error(&e);
        }
        true
    }

    fn fetch(&self, mime: Option<&str>, extra: Attributes) -> Result<(), CameraError> {
        let camera = self.camera()?;
        let mime = mime.unwrap_or(&self.config.default_mime);
        let image = self.runtime.block_on(camera.get_image(mime, &extra))?;
        println!(
            "  {} {} bytes ({})",
            "▶".green(),
            image.data.len().to_string().bold(),
            image.mime_type.to_string().dimmed()
        );
        Ok(())
    }

    fn set(&self, set: Attributes) -> Result<(), CameraError> {
        let camera = self.camera()?;
        let mut command = Attributes::new();
        command.insert("set".to_string(), Value::Object(set));
        let response = self.runtime.block_on(camera.do_command(&command))?;
        print_json(&Value::Object(response));
        Ok(())
    }

    fn images(&self, names: &[String]) -> Result<(), CameraError> {
        let camera = self.camera()?;
        let (images, meta) = self
            .runtime
            .block_on(camera.get_images(names, &Attributes::new()))?;
        if images.is_empty() {
            println!("  {}", "no images matched the source filter".dimmed());
        }
        for image in &images {
            println!(
                "  {} {} – {} bytes ({})",
                "▶".green(),
                image.name.bold(),
                image.data.len(),
                image.mime_type.to_string().dimmed()
            );
        }
        println!("  captured at {}", meta.captured_at.to_rfc3339().dimmed());
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), CameraError> {
        let camera = self.camera()?;
        let image = self
            .runtime
            .block_on(camera.get_image(&self.config.default_mime, &Attributes::new()))?;
        std::fs::write(path, &image.data).map_err(|e| CameraError::Io {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        println!(
            "  {} wrote {} bytes to {}",
            "✓".green().bold(),
            image.data.len(),
            path.display().to_string().bold()
        );
        Ok(())
    }

    fn props(&self) -> Result<(), CameraError> {
        let camera = self.camera()?;
        let props = self.runtime.block_on(camera.get_properties())?;
        print_json(&json!(props));
        Ok(())
    }

    fn reload(&mut self) {
        match config::load() {
            Ok(cfg) => {
                if cfg.name != self.config.name {
                    self.registry.remove(&self.config.name);
                }
                self.config = cfg;
                self.bring_up();
            }
            Err(e) => println!("{}: {}", "Config error".red(), e),
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, mut shell: Shell) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "imagedir>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(command) => {
                if !shell.execute(command) {
                    println!("{}", "Goodbye.".green());
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
            Err(msg) => println!(
                "{} Type {} for available commands.",
                msg.red(),
                "/help".bold()
            ),
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "image-dir Commands".bold().underline());
    println!("  {}      – fetch the image under the cursor", "/next [mime]".bold().cyan());
    println!("  {}        – fetch position n", "/index <n>".bold().cyan());
    println!("  {}          – fetch relative to the cursor", "/jog <n>".bold().cyan());
    println!("  {}            – fetch the first image", "/reset".bold().cyan());
    println!("  {}       – move the cursor without fetching", "/set <json>".bold().cyan());
    println!("  {}  – batch fetch filtered by source", "/images [names…]".bold().cyan());
    println!("  {}      – fetch and write to a file", "/save <path>".bold().cyan());
    println!("  {}            – camera properties", "/props".bold().cyan());
    println!("  {}           – attribute JSON schema", "/schema".bold().cyan());
    println!("  {}           – re-read config and reconfigure", "/reload".bold().cyan());
    println!("  {}      – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn directive(key: &str, value: Value) -> Attributes {
    let mut extra = Attributes::new();
    extra.insert(key.to_string(), value);
    extra
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{}: {}", "Serialization error".red(), e),
    }
}

fn print_error(e: &CameraError) {
    println!("{} [{:?}] {}", "Error".red().bold(), e.category(), e);
}
