use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lucky_draw_client::deploy::{self, Deployment};
use lucky_draw_client::encoding;
use lucky_draw_client::workflow::Endpoint;
use lucky_draw_client::{
    address, CallError, Config, ErrorKind, Invoker, LotusClient, SetupFields, Step, WalletRpc,
    Workflow, WorkflowState,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lucky-draw", version, about = "fvm lucky draw")]
struct Cli {
    /// TOML file with rpc_url, rpc_token, actor, ...
    #[arg(long, short, env = "LUCKY_DRAW_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "LUCKY_DRAW_RPC_URL")]
    rpc_url: Option<String>,
    #[arg(long, env = "LUCKY_DRAW_RPC_TOKEN", hide_env_values = true)]
    rpc_token: Option<String>,
    /// Lucky draw actor address
    #[arg(long, env = "LUCKY_DRAW_ACTOR")]
    actor: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Step through setup, add candidates, set ready and draw (default)
    Wizard,
    /// Print the actor's current state
    State,
    /// Create a new lucky draw actor through the init actor
    Deploy {
        #[arg(long)]
        code_cid: String,
        #[arg(long, default_value_t = 1)]
        winners: u32,
        /// Comma separated initial candidates
        #[arg(long, default_value = "")]
        candidates: String,
    },
    /// Print base64 params without sending anything
    Encode {
        #[command(subcommand)]
        params: EncodeCommand,
    },
}

#[derive(Subcommand)]
enum EncodeCommand {
    AddCandidates {
        candidates: String,
    },
    Init {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        winners: u32,
        #[arg(long, default_value = "")]
        candidates: String,
    },
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(url) = &self.rpc_url {
            config.rpc_url = Some(url.clone());
        }
        if let Some(token) = &self.rpc_token {
            config.rpc_token = Some(token.clone());
        }
        if let Some(actor) = &self.actor {
            config.actor = Some(actor.clone());
        }
        Ok(config)
    }
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    match cli.command.unwrap_or(Command::Wizard) {
        Command::Wizard => wizard(&config).await,
        Command::State => {
            let wf = Workflow::open(&config.setup_fields(), config.call_options()).await?;
            println!("{}", wf.read_current_state().await?);
            Ok(())
        }
        Command::Deploy {
            code_cid,
            winners,
            candidates,
        } => deploy_actor(&config, &code_cid, winners, &candidates).await,
        Command::Encode { params } => encode(params),
    }
}

fn optional_list(input: &str) -> Result<Vec<address::Address>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(address::parse_list(input)?)
}

fn encode(params: EncodeCommand) -> Result<()> {
    let env = match params {
        EncodeCommand::AddCandidates { candidates } => {
            encoding::add_candidates(&address::parse_list(&candidates)?)?
        }
        EncodeCommand::Init {
            owner,
            winners,
            candidates,
        } => encoding::init_params(
            &address::validate(&owner)?,
            winners,
            &optional_list(&candidates)?,
        )?,
    };
    println!("{}", env.to_base64());
    Ok(())
}

async fn deploy_actor(
    config: &Config,
    code_cid: &str,
    winners: u32,
    candidates: &str,
) -> Result<()> {
    let endpoint = Endpoint {
        url: config.rpc_url.clone().context("rpc url is not configured")?,
        token: config.rpc_token.clone().unwrap_or_default(),
    };
    let client = Arc::new(LotusClient::new(endpoint));
    let owner = client
        .default_address()
        .await
        .context("failed to get owner address")?;
    println!("owner address: {owner}");

    let deployment = Deployment {
        code_cid: code_cid
            .parse()
            .with_context(|| format!("invalid code cid {code_cid}"))?,
        owner: owner.clone(),
        winners_num: winners,
        candidates: optional_list(candidates)?,
    };
    let init_actor = address::validate(&config.init_actor)?;
    let invoker = Invoker::with_confirmations(client, config.confirmations);
    let created = deploy::create_actor(&invoker, &init_actor, &owner, &deployment).await?;
    println!("id address: {}", created.id_address);
    println!("robust address: {}", created.robust_address);
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

async fn prompt_field(input: &mut Input, label: &str, current: &mut String) -> Result<()> {
    let shown = if current.is_empty() {
        format!("{label}: ")
    } else {
        format!("{label} [{current}]: ")
    };
    let Some(line) = prompt(input, &shown).await? else {
        bail!("input closed");
    };
    if !line.trim().is_empty() {
        *current = line.trim().to_owned();
    }
    Ok(())
}

fn report(err: &CallError) {
    let prefix = match err.kind() {
        ErrorKind::Validation => "invalid input",
        ErrorKind::Wallet => "wallet error",
        ErrorKind::Submission => "submission failed",
        ErrorKind::Rejected => "actor rejected the call",
        ErrorKind::Decode => "unreadable result",
    };
    println!("{prefix}: {err}");
}

fn render(state: &WorkflowState) {
    println!();
    println!("step {}", state.step);
    if let Some(setup) = &state.setup {
        println!("actor: {}", setup.actor);
        println!("owner: {}", setup.owner);
        println!("rpc: {}", setup.endpoint.url);
    }
    if !state.candidates.is_empty() {
        println!("candidates: {}", state.candidates.len());
    }
    for (i, winner) in state.winners.iter().enumerate() {
        println!("winner #{}: {}", i + 1, winner);
    }
}

async fn wizard(config: &Config) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut fields: SetupFields = config.setup_fields();

    render(&WorkflowState::default());
    let wf = loop {
        prompt_field(&mut input, "actor", &mut fields.actor).await?;
        prompt_field(&mut input, "rpc url", &mut fields.rpc_url).await?;
        prompt_field(&mut input, "rpc token", &mut fields.rpc_token).await?;
        match Workflow::open(&fields, config.call_options()).await {
            Ok(wf) => break wf,
            Err(err) => report(&err),
        }
    };

    let mut states = wf.subscribe();
    render(&states.borrow_and_update());
    loop {
        if states.has_changed().unwrap_or(false) {
            render(&states.borrow_and_update());
        }
        // an open workflow is past setup
        let label = match wf.state().step {
            Step::MarkReady => "enter to set state ready, 'state' or 'quit': ",
            Step::Draw => "enter to draw a winner, 'state' or 'quit': ",
            _ => "candidates (comma separated), 'state' or 'quit': ",
        };
        let Some(line) = prompt(&mut input, label).await? else {
            return Ok(());
        };
        let result = match line.trim() {
            "quit" | "exit" => return Ok(()),
            "state" => wf.read_current_state().await.map(|text| println!("{text}")),
            entered => match wf.state().step {
                Step::MarkReady => wf.mark_ready().await.map(|_| println!("lucky draw is ready")),
                Step::Draw => wf.draw().await.map(|(winner, _)| println!("Winner: {winner}")),
                _ => wf
                    .add_candidates(entered)
                    .await
                    .map(|_| println!("add candidates success")),
            },
        };
        if let Err(err) = result {
            report(&err);
        }
    }
}
