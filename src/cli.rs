//! The `mozreport` subcommands.

use crate::{
    api::{client::Client, id::ClusterId},
    backend::rest::Server,
    config::{self, CliConfig, ConfigError, RemoteConfig, CONFIG_FILE_NAME, DEFAULT_HOST},
    experiment::{
        etl_script, ExperimentConfig, EXPERIMENT_FILE_NAME, SCRIPT_FILE_NAME,
        SUMMARY_FILE_NAME,
    },
    prompt::Prompter,
    template::{self, Template},
    workflow::{self, DEFAULT_CLUSTER, POLL_INTERVAL},
};
use anyhow::{anyhow, bail, Context as _, Result};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::info;

/// Expected failures, reported to the user with a hint instead of a trace.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("I can't find your mozreport configuration file.\nHave you run `mozreport setup` yet?")]
    MissingConfig,
    #[error("I can't find an experiment configuration file in this path.\nHave you run `mozreport new` yet?")]
    MissingExperiment,
    #[error("I can't find the script {0}.")]
    MissingScript(PathBuf),
    #[error("Couldn't find template {name}.\nI know about: {}", .known.join(","))]
    UnknownTemplate { name: String, known: Vec<String> },
    #[error("The job finished with result {state}. Details: {url}")]
    RunFailed { state: String, url: String },
}

/// Whether one step should chain into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Always,
    Never,
    Prompt,
}

impl Pipeline {
    fn proceed(self, ask: impl FnOnce() -> io::Result<bool>) -> io::Result<bool> {
        match self {
            Pipeline::Always => Ok(true),
            Pipeline::Never => Ok(false),
            Pipeline::Prompt => ask(),
        }
    }
}

impl FromStr for Pipeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Pipeline::Always),
            "never" => Ok(Pipeline::Never),
            "prompt" => Ok(Pipeline::Prompt),
            other => Err(format!("expected always, never or prompt, found {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    pub cluster: ClusterId,
    pub wait: bool,
    pub filename: PathBuf,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        SubmitOptions {
            cluster: ClusterId::from(DEFAULT_CLUSTER),
            wait: true,
            filename: PathBuf::from(SCRIPT_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Setup,
    New,
    Submit(SubmitOptions),
    Fetch,
    Report { template: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub pipeline: Pipeline,
    /// `None` when help was asked for or no command was given.
    pub command: Option<Command>,
}

pub fn parse_args(mut args: pico_args::Arguments) -> Result<Invocation> {
    let help = args.contains(["-h", "--help"]);
    let pipeline = args
        .opt_value_from_str("--pipeline")?
        .unwrap_or(Pipeline::Prompt);
    let subcommand = match args.subcommand()? {
        Some(subcommand) if !help => subcommand,
        _ => return Ok(Invocation { pipeline, command: None }),
    };

    let command = match subcommand.as_str() {
        "setup" => Command::Setup,
        "new" => Command::New,
        "submit" => {
            let defaults = SubmitOptions::default();
            let cluster = args
                .opt_value_from_str::<_, String>("--cluster")?
                .map(ClusterId::from)
                .unwrap_or(defaults.cluster);
            let wait = !args.contains("--no-wait");
            let filename = args.opt_free_from_str()?.unwrap_or(defaults.filename);
            Command::Submit(SubmitOptions { cluster, wait, filename })
        }
        "fetch" => Command::Fetch,
        "report" => Command::Report {
            template: args.opt_value_from_str("--template")?,
        },
        other => bail!("unknown command {}", other),
    };

    let remaining = args.finish();
    if !remaining.is_empty() {
        bail!("unexpected arguments: {:?}", remaining);
    }
    Ok(Invocation {
        pipeline,
        command: Some(command),
    })
}

pub fn usage() -> String {
    let data_dir = config::data_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|err| err.to_string());
    format!(
        "\
Mozreport helps you write experiment reports.

USAGE:
    mozreport [--pipeline always|never|prompt] <COMMAND>

The workflow looks like:
    mozreport setup                        the first time you use mozreport
    mozreport new                          declare an experiment and generate an analysis script
    mozreport submit [--cluster ID] [--no-wait] [FILENAME]
                                           run an analysis script on Databricks
    mozreport fetch                        download the result
    mozreport report [--template NAME]     set up a report template

--pipeline decides whether a step continues into the next one (default: prompt).

The local configuration directory is {}.
",
        data_dir
    )
}

fn missing_config(err: ConfigError) -> anyhow::Error {
    match err {
        ConfigError::Missing(_) => CliError::MissingConfig.into(),
        err => err.into(),
    }
}

/// Where a command reads and writes.
pub struct Context {
    pub data_dir: PathBuf,
    pub work_dir: PathBuf,
    pub pipeline: Pipeline,
    pub poll_interval: Duration,
}

impl Context {
    pub fn from_env(pipeline: Pipeline) -> Result<Self> {
        Ok(Context {
            data_dir: config::data_dir()?,
            work_dir: std::env::current_dir().context("no usable working directory")?,
            pipeline,
            poll_interval: POLL_INTERVAL,
        })
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    fn experiment_path(&self) -> PathBuf {
        self.work_dir.join(EXPERIMENT_FILE_NAME)
    }

    fn templates(&self) -> Result<Vec<Template>> {
        Ok(Template::discover(Some(self.data_dir.as_path()))?)
    }

    /// The saved config. Its default template is not checked here: only
    /// `report` uses it, and resolves it against the discovered templates.
    fn cli_config(&self) -> Result<CliConfig> {
        CliConfig::from_file_unchecked(&self.config_path()).map_err(missing_config)
    }

    fn experiment(&self) -> Result<ExperimentConfig> {
        match ExperimentConfig::from_file(&self.experiment_path()) {
            Ok(experiment) => Ok(experiment),
            Err(ConfigError::Missing(_)) => Err(CliError::MissingExperiment.into()),
            Err(err) => Err(err.into()),
        }
    }
}

pub fn run(command: Command, ctx: &Context) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut prompter = Prompter::new(stdin.lock(), stdout.lock());
    match command {
        Command::Setup => setup(ctx, &mut prompter),
        Command::New => new(ctx, &mut prompter),
        Command::Submit(options) => submit(ctx, &mut prompter, &options),
        Command::Fetch => fetch(ctx, &mut prompter),
        Command::Report { template } => report(ctx, template),
    }
}

/// Answers offered when (re)running `setup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDefaults {
    pub default_template: String,
    pub host: String,
    pub token: Option<String>,
}

impl SetupDefaults {
    pub fn fresh(templates: &[Template]) -> Self {
        SetupDefaults {
            default_template: templates
                .first()
                .map(|template| template.name.clone())
                .unwrap_or_default(),
            host: DEFAULT_HOST.to_string(),
            token: None,
        }
    }
}

impl From<&CliConfig> for SetupDefaults {
    fn from(config: &CliConfig) -> Self {
        SetupDefaults {
            default_template: config.default_template.clone(),
            host: config.remote.host.clone(),
            token: Some(config.remote.token.clone()),
        }
    }
}

pub fn build_cli_config<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, defaults: &SetupDefaults, templates: &[Template]) -> Result<CliConfig> {
    let default_template = prompter.ask("Default template", Some(defaults.default_template.as_str()))?;
    let host = prompter.ask("Databricks URL", Some(defaults.host.as_str()))?;
    prompter.say(&format!(
        "You can create a Databricks access token by navigating to {}/#setting/account, \
         selecting \"Access Tokens\", and \"Generate New Token.\"",
        host.trim_end_matches('/')
    ))?;
    let token = prompter.ask("Databricks token", defaults.token.as_deref())?;
    Ok(CliConfig::new(default_template, RemoteConfig { token, host }, templates)?)
}

/// Answers offered when (re)running `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDefaults {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub branches: Vec<String>,
}

impl From<Option<&ExperimentConfig>> for ExperimentDefaults {
    fn from(experiment: Option<&ExperimentConfig>) -> Self {
        match experiment {
            Some(experiment) => ExperimentDefaults {
                id: Some(experiment.id.clone()),
                slug: Some(experiment.slug.clone()),
                branches: experiment.branches.clone(),
            },
            None => ExperimentDefaults {
                id: None,
                slug: None,
                branches: vec!["control".to_string(), "experiment".to_string()],
            },
        }
    }
}

pub fn build_experiment_config<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, defaults: ExperimentDefaults) -> Result<ExperimentConfig> {
    let slug = prompter.ask("Experiment slug", defaults.slug.as_deref())?;
    let default_branches = defaults.branches.join(",");
    let branches = prompter.ask("Branches (comma separated)", Some(default_branches.as_str()))?;
    let branches = branches
        .split(',')
        .map(str::trim)
        .filter(|branch| !branch.is_empty())
        .map(String::from)
        .collect();
    let mut experiment = ExperimentConfig::new(slug, branches);
    if let Some(id) = defaults.id {
        experiment.id = id;
    }
    Ok(experiment)
}

fn setup<R: BufRead, W: Write>(ctx: &Context, prompter: &mut Prompter<R, W>) -> Result<()> {
    let templates = ctx.templates()?;
    let defaults = match CliConfig::from_file_unchecked(&ctx.config_path()) {
        Ok(existing) => {
            let mut defaults = SetupDefaults::from(&existing);
            if existing.validate(&templates).is_err() {
                prompter.say(&format!(
                    "The template {} is not available anymore.",
                    existing.default_template
                ))?;
                defaults.default_template = SetupDefaults::fresh(&templates).default_template;
            }
            defaults
        }
        Err(ConfigError::Missing(_)) => SetupDefaults::fresh(&templates),
        Err(err) => return Err(err.into()),
    };
    let config = build_cli_config(prompter, &defaults, &templates)?;
    config.save(&ctx.config_path())?;
    info!(path = %ctx.config_path().display(), "saved settings");
    Ok(())
}

fn new<R: BufRead, W: Write>(ctx: &Context, prompter: &mut Prompter<R, W>) -> Result<()> {
    let existing = match ExperimentConfig::from_file(&ctx.experiment_path()) {
        Ok(existing) => Some(existing),
        Err(ConfigError::Missing(_)) => None,
        Err(err) => return Err(err.into()),
    };
    let experiment = build_experiment_config(prompter, ExperimentDefaults::from(existing.as_ref()))?;
    experiment.save(&ctx.experiment_path())?;

    prompter.say(&format!("Writing analysis script to {}...", SCRIPT_FILE_NAME))?;
    let script_path = ctx.work_dir.join(SCRIPT_FILE_NAME);
    fs::write(&script_path, etl_script())
        .with_context(|| format!("could not write {}", script_path.display()))?;

    let submit_now = ctx.pipeline.proceed(|| {
        prompter.confirm("Would you like to submit the default script to shared_serverless now?", true)
    })?;
    if submit_now {
        submit(ctx, prompter, &SubmitOptions::default())
    } else {
        prompter.say(&format!(
            "You can edit `{}` to customize the analysis, \
             and then run `mozreport submit` whenever you're ready to continue.",
            SCRIPT_FILE_NAME
        ))?;
        Ok(())
    }
}

fn read_script(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(script) => Ok(script),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(CliError::MissingScript(path.to_path_buf()).into())
        }
        Err(err) => Err(anyhow!(err).context(format!("could not read {}", path.display()))),
    }
}

fn submit<R: BufRead, W: Write>(ctx: &Context, prompter: &mut Prompter<R, W>, options: &SubmitOptions) -> Result<()> {
    let config = ctx.cli_config()?;
    let experiment = ctx.experiment()?;
    let script = read_script(&ctx.work_dir.join(&options.filename))?;
    let mut client = Server::new(&config.remote);
    submit_with(ctx, prompter, &mut client, &experiment, &script, options)
}

/// Submits `script`, optionally waits for it and, when the pipeline allows,
/// fetches the result.
pub fn submit_with<R: BufRead, W: Write>(
    ctx: &Context,
    prompter: &mut Prompter<R, W>,
    client: &mut dyn Client,
    experiment: &ExperimentConfig,
    script: &[u8],
    options: &SubmitOptions,
) -> Result<()> {
    prompter.say("Submitting job to Databricks...")?;
    let run = workflow::submit_script(client, experiment, script, &options.cluster)?;
    let status = client.get_run_status(run)?;
    prompter.say(&format!("Submitted. Job status: {}", status.status_url()))?;
    if !options.wait {
        return Ok(());
    }

    prompter.say("Waiting for completion...")?;
    let status = workflow::wait_for_completion(client, run, ctx.poll_interval, |status| {
        info!(state = ?status.lifecycle_state(), "waiting for run")
    })?;
    match status.result_state() {
        Some(result) if result.is_success() => {}
        result => {
            let state = result
                .map(|result| String::from(result.clone()))
                .unwrap_or_else(|| String::from(status.lifecycle_state().clone()));
            return Err(CliError::RunFailed {
                state,
                url: status.status_url().to_string(),
            }
            .into());
        }
    }
    prompter.say("Done.")?;

    let download = ctx.pipeline.proceed(|| {
        prompter.confirm(
            "Would you like to download the result? This will overwrite any existing local result.",
            true,
        )
    })?;
    if download {
        fetch_with(ctx, prompter, client, experiment)?;
    }
    Ok(())
}

fn fetch<R: BufRead, W: Write>(ctx: &Context, prompter: &mut Prompter<R, W>) -> Result<()> {
    let config = ctx.cli_config()?;
    let experiment = ctx.experiment()?;
    let mut client = Server::new(&config.remote);
    fetch_with(ctx, prompter, &mut client, &experiment)
}

pub fn fetch_with<R: BufRead, W: Write>(ctx: &Context, prompter: &mut Prompter<R, W>, client: &mut dyn Client, experiment: &ExperimentConfig) -> Result<()> {
    prompter.say(&format!("Downloading file dbfs:{}", experiment.remote_summary_path()))?;
    let destination = ctx.work_dir.join(SUMMARY_FILE_NAME);
    let written = workflow::fetch_summary(client, experiment, &destination)?;
    prompter.say(&format!("Wrote {} bytes to {}.", written, SUMMARY_FILE_NAME))?;
    Ok(())
}

fn report(ctx: &Context, template: Option<String>) -> Result<()> {
    let config = ctx.cli_config()?;
    let templates = ctx.templates()?;
    let name = template.unwrap_or(config.default_template);
    let found = template::find(&templates, &name).ok_or_else(|| CliError::UnknownTemplate {
        name: name.clone(),
        known: template::names(&templates).into_iter().map(String::from).collect(),
    })?;
    found.materialize(&ctx.work_dir, false)?;
    println!("Installed the {} template in {}.", name, ctx.work_dir.display());
    Ok(())
}
