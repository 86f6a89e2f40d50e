mod repl;

use clap::{Args, Parser, Subcommand};
use content_adapters::{create_language_model, AdapterError, ChatCompletionsClient};
use content_core::{
    export, export_file_name, render_prompt, resolve_credential_with, CampaignType,
    CompletionRequest, ConfigError, ConfigStore, ContentOptions, ContentType, Credential, DocType,
    ExportError, ExportFormat, GenerationError, GenerationRequest, GenerationSettings,
    LanguageModel, LogLevel, LogRecord, LogSink, Platform, PromptError, PromptRegistry,
    RequestError, Session, SessionError, StderrLogSink, TechnicalLevel, DEFAULT_CONFIG_FILE,
    DEFAULT_SECRETS_FILE, KNOWN_MODELS,
};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const TEST_PROMPT: &str = "Please reply 'OK'";

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let sink = StderrLogSink::new(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });
    let context = Context {
        config_path: cli.config,
        secrets_path: cli.secrets,
        api_key: cli.api_key,
        env_lookup: process_env,
    };

    match cli.command {
        Command::Generate(args) => run_generate(&context, args, &sink),
        Command::Prompt(args) => run_prompt(&context, args),
        Command::Session(args) => run_session(&context, args, &sink),
        Command::Templates(args) => run_templates(&context, args),
        Command::Models => {
            run_models(&context);
            Ok(())
        }
        Command::Config(command) => handle_config(&context, command, &sink),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Global options shared by every subcommand.
struct Context {
    config_path: PathBuf,
    secrets_path: PathBuf,
    api_key: Option<String>,
    env_lookup: fn(&str) -> Option<String>,
}

impl Context {
    fn open_store(&self) -> Result<ConfigStore, CliError> {
        Ok(ConfigStore::open(self.config_path.clone())?)
    }

    /// Resolves the API key once; a missing key is reported before any
    /// network activity.
    fn credential(&self, store: &ConfigStore, sink: &dyn LogSink) -> Result<Credential, CliError> {
        let resolved = resolve_credential_with(
            self.api_key.as_deref(),
            &self.secrets_path,
            &store.config().llm,
            self.env_lookup,
        )?;
        match resolved {
            Some((credential, source)) => {
                sink.log(LogRecord::new(
                    LogLevel::Debug,
                    format!("Using API key from {source}."),
                ));
                Ok(credential)
            }
            None => Err(GenerationError::missing_credential().into()),
        }
    }

    fn language_model(
        &self,
        store: &ConfigStore,
        sink: &dyn LogSink,
    ) -> Result<ChatCompletionsClient, CliError> {
        let credential = self.credential(store, sink)?;
        let client = create_language_model(store.config(), Some(credential))?;
        debug!("chat completions endpoint: {}", client.url());
        Ok(client)
    }
}

fn handle_config(
    context: &Context,
    command: ConfigCommand,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::TestLlm(args) => run_test_llm(context, args, sink),
        ConfigCommand::Init(args) => run_config_init(context, args, sink),
    }
}

fn run_generate(context: &Context, args: GenerateArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let store = context.open_store()?;
    let request = args.options.to_request(&store, args.topic.join(" "));
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let model = context.language_model(&store, sink)?;

    let mut session = Session::new(model, &prompts, sink)
        .with_settings(GenerationSettings::from_config(store.config()));
    let result = session.generate(request)?;
    println!("{}", result.text);

    if let Some(format) = args.export {
        let path = args
            .output
            .unwrap_or_else(|| PathBuf::from(export_file_name(result, format)));
        let bytes = export(result, format)?;
        write_file(&path, &bytes)?;
        sink.log(LogRecord::info(format!(
            "Exported {format} ({}) to {}",
            format.mime_type(),
            path.display()
        )));
    }

    Ok(())
}

fn run_prompt(context: &Context, args: PromptArgs) -> Result<(), CliError> {
    let store = context.open_store()?;
    let request = args.options.to_request(&store, args.topic.join(" "));
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let prompt = render_prompt(&prompts, &request)?;
    println!("{prompt}");
    Ok(())
}

fn run_session(context: &Context, args: SessionArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let store = context.open_store()?;
    // The topic comes from each input line; check everything else up front.
    let template = args.options.to_request(&store, String::new());
    GenerationRequest {
        topic: "topic".to_string(),
        ..template.clone()
    }
    .validate()?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let model = context.language_model(&store, sink)?;

    let mut session = Session::new(model, &prompts, sink)
        .with_settings(GenerationSettings::from_config(store.config()));

    let stdin = io::stdin();
    let stdout = io::stdout();
    repl::run(&mut session, &template, stdin.lock(), stdout.lock())?;
    Ok(())
}

fn run_templates(context: &Context, args: TemplatesArgs) -> Result<(), CliError> {
    let store = context.open_store()?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;
    let stdout = io::stdout();
    write_templates(&prompts, args.key.as_deref(), &mut stdout.lock())
}

/// Lists every template, or prints the raw text of the one named `key`.
fn write_templates<W: Write>(
    prompts: &PromptRegistry,
    key: Option<&str>,
    out: &mut W,
) -> Result<(), CliError> {
    if let Some(key) = key {
        let template = prompts
            .get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?;
        writeln!(out, "{}", template.template())?;
        return Ok(());
    }

    for key in prompts.keys() {
        let Some(template) = prompts.get(key) else {
            continue;
        };
        let metadata = template.metadata();
        let source = match metadata.source().as_path() {
            Some(path) => path.display().to_string(),
            None => "built-in".to_string(),
        };
        writeln!(
            out,
            "{key} [{source}] {}",
            metadata.description().unwrap_or("")
        )?;
        let placeholders: Vec<_> = template.placeholders().collect();
        writeln!(out, "  placeholders: {}", placeholders.join(", "))?;
    }

    let directories = prompts.custom_directories();
    if directories.is_empty() {
        writeln!(out, "Custom directories: none")?;
    } else {
        let listed: Vec<_> = directories
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        writeln!(out, "Custom directories: {}", listed.join(", "))?;
    }
    Ok(())
}

fn run_models(context: &Context) {
    let configured = ConfigStore::open(context.config_path.clone())
        .map(|store| store.config().llm.model_name.clone())
        .ok();
    for model in KNOWN_MODELS {
        if configured.as_deref() == Some(*model) {
            println!("{model} (configured)");
        } else {
            println!("{model}");
        }
    }
    if let Some(configured) = configured.filter(|name| !KNOWN_MODELS.contains(&name.as_str())) {
        println!("{configured} (configured, not in the known list)");
    }
}

fn run_test_llm(context: &Context, args: TestLlmArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    let store = context.open_store()?;
    let config = store.config();
    let model_id = args.model.unwrap_or_else(|| config.llm.model_name.clone());

    sink.log(LogRecord::info(format!(
        "Testing model {model_id} at {}",
        config.llm.base_url
    )));
    let model = context.language_model(&store, sink)?;

    let settings = GenerationSettings::from_config(config);
    let request = CompletionRequest {
        prompt: TEST_PROMPT,
        model_id: &model_id,
        creativity: 0.0,
        max_tokens: settings.max_tokens,
        system_prompt: settings.system_prompt.as_deref(),
    };

    match model.generate(&request) {
        Ok(reply) if reply.trim().is_empty() => {
            sink.log(LogRecord::new(LogLevel::Error, "LLM test failed: empty reply"));
            Err(CliError::TestFailed("the model returned an empty reply".to_string()))
        }
        Ok(reply) => {
            sink.log(LogRecord::info("LLM configuration works."));
            sink.log(LogRecord::new(LogLevel::Debug, format!("Reply: {reply}")));
            Ok(())
        }
        Err(err) => {
            sink.log(LogRecord::new(
                LogLevel::Error,
                format!("LLM test failed: {err}"),
            ));
            Err(err.into())
        }
    }
}

fn run_config_init(context: &Context, args: InitArgs, sink: &dyn LogSink) -> Result<(), CliError> {
    if context.config_path.exists() && !args.force {
        return Err(CliError::ConfigExists(context.config_path.clone()));
    }
    let mut store = context.open_store()?;
    if args.force {
        *store.config_mut() = Default::default();
    }
    store.save()?;
    sink.log(LogRecord::info(format!(
        "Wrote default configuration to {}",
        store.path().display()
    )));
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CliError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0} already exists; pass --force to overwrite it")]
    ConfigExists(PathBuf),
    #[error("prompt template error: {0}")]
    Prompt(#[from] PromptError),
    #[error("could not create the model client: {0}")]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid input: {0}")]
    Request(#[from] RequestError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("failed to write `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] io::Error),
    #[error("{0}")]
    TestFailed(String),
}

#[derive(Parser)]
#[command(
    name = "contentctl",
    version,
    about = "Generate blog posts, social media copy and other marketing text with a hosted LLM"
)]
struct Cli {
    /// Path of the JSON configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path of the TOML secrets file holding `[groq] api_key`
    #[arg(long, global = true, default_value = DEFAULT_SECRETS_FILE)]
    secrets: PathBuf,

    /// API key; takes precedence over the secrets file and GROQ_API_KEY
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Print debug output, including HTTP and retry details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one piece of content and print it
    Generate(GenerateArgs),
    /// Print the prompt that would be sent, without calling the model
    Prompt(PromptArgs),
    /// Interactive session with history, search and export
    Session(SessionArgs),
    /// List prompt templates, or print the template for one content type
    Templates(TemplatesArgs),
    /// List known model identifiers
    Models,
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Send a short test prompt with the configured settings
    TestLlm(TestLlmArgs),
    /// Write a configuration file with default values
    Init(InitArgs),
}

#[derive(Args)]
struct TestLlmArgs {
    /// Model to test instead of the configured one
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args)]
struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

/// Generation settings shared by `generate`, `prompt` and `session`.
#[derive(Args, Clone)]
struct RequestOptions {
    /// Content type: blog_post, social_media, product_description,
    /// marketing_copy, technical_doc or other
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "blog_post")]
    content_type: ContentType,

    /// Model identifier (defaults to llm.model_name from the config file)
    #[arg(short, long)]
    model: Option<String>,

    /// Writing tone, e.g. professional, casual, persuasive
    #[arg(long, default_value = "informative")]
    tone: String,

    /// Approximate length (words, or characters for social media)
    #[arg(short, long, value_name = "N", default_value_t = 800)]
    length: u32,

    /// Sampling temperature between 0.0 and 1.0
    #[arg(short, long, value_name = "0.0-1.0", default_value_t = 0.7)]
    creativity: f32,

    /// Target audience
    #[arg(long, value_name = "TEXT")]
    audience: Option<String>,

    /// Extra instructions appended to the prompt
    #[arg(long, value_name = "TEXT")]
    instructions: Option<String>,

    #[command(flatten)]
    content: ContentArgs,
}

/// Options that only some content types use; the rest ignore them.
#[derive(Args, Clone)]
#[command(next_help_heading = "Content type options")]
struct ContentArgs {
    /// Social media network: linkedin, twitter, instagram or facebook
    #[arg(long, value_name = "NAME")]
    platform: Option<Platform>,

    /// Leave hashtags out of social media posts
    #[arg(long)]
    no_hashtags: bool,

    /// What a social media post should ask readers to do, e.g. "sign up"
    #[arg(long, value_name = "TEXT", conflicts_with = "no_cta")]
    cta: Option<String>,

    /// Leave the call to action out of social media posts
    #[arg(long)]
    no_cta: bool,

    /// Leave section headers out of blog posts
    #[arg(long)]
    no_headers: bool,

    /// Leave the conclusion out of blog posts
    #[arg(long)]
    no_conclusion: bool,

    /// Product feature to highlight; repeat for several
    #[arg(long = "feature", value_name = "TEXT")]
    features: Vec<String>,

    /// Marketing campaign: ad_copy, landing_page, brochure or sales_email
    #[arg(long, value_name = "KIND")]
    campaign: Option<CampaignType>,

    /// Unique selling point for marketing copy
    #[arg(long, value_name = "TEXT")]
    selling_point: Option<String>,

    /// Documentation type: user_guide, api_documentation, tutorial or reference_manual
    #[arg(long, value_name = "KIND")]
    doc_type: Option<DocType>,

    /// Reader expertise for documentation: beginner, intermediate, advanced or expert
    #[arg(long, value_name = "LEVEL")]
    level: Option<TechnicalLevel>,

    /// Documentation section to include; repeat for several
    #[arg(long = "section", value_name = "TEXT")]
    sections: Vec<String>,
}

impl ContentArgs {
    fn to_options(&self) -> ContentOptions {
        ContentOptions {
            platform: self.platform,
            include_hashtags: !self.no_hashtags,
            include_call_to_action: !self.no_cta,
            call_to_action: self.cta.clone().filter(|cta| !cta.trim().is_empty()),
            include_headers: !self.no_headers,
            include_conclusion: !self.no_conclusion,
            key_features: self.features.clone(),
            campaign: self.campaign,
            selling_point: self.selling_point.clone().filter(|usp| !usp.trim().is_empty()),
            doc_type: self.doc_type,
            technical_level: self.level,
            key_sections: self.sections.clone(),
        }
    }
}

impl RequestOptions {
    fn to_request(&self, store: &ConfigStore, topic: String) -> GenerationRequest {
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| store.config().llm.model_name.clone());
        let mut request = GenerationRequest::new(self.content_type, topic)
            .with_model(model)
            .with_tone(self.tone.clone())
            .with_target_length(self.length)
            .with_creativity(self.creativity)
            .with_options(self.content.to_options());
        request.audience = self.audience.clone().filter(|a| !a.trim().is_empty());
        request.instructions = self.instructions.clone().filter(|i| !i.trim().is_empty());
        request
    }
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    options: RequestOptions,

    /// Write the result in this format: txt, md, html or json
    #[arg(short, long, value_name = "FMT")]
    export: Option<ExportFormat>,

    /// Destination for --export (defaults to content_<timestamp>.<ext>)
    #[arg(short, long, value_name = "PATH", requires = "export")]
    output: Option<PathBuf>,

    /// What the content should be about
    #[arg(required = true, num_args = 1..)]
    topic: Vec<String>,
}

#[derive(Args)]
struct PromptArgs {
    #[command(flatten)]
    options: RequestOptions,

    /// What the content should be about
    #[arg(required = true, num_args = 1..)]
    topic: Vec<String>,
}

#[derive(Args)]
struct SessionArgs {
    #[command(flatten)]
    options: RequestOptions,
}

#[derive(Args)]
struct TemplatesArgs {
    /// Content type whose template text to print
    #[arg(value_name = "KEY")]
    key: Option<String>,
}
