use anyhow::Result;
use clap::Parser;
use log::info;
use qlearn_candle_agent::{
    dqn::{Dqn, DqnConfig, DqnModel, DqnModelConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
};
use qlearn_core::{ActionId, FrameStack, Transition};

const CHAIN_LEN: usize = 6;
const MAX_EPISODE_STEPS: usize = 20;
const HIST_SIZE: usize = 2;
const LEFT: ActionId = -1;
const RIGHT: ActionId = 1;
const LR: f64 = 0.001;
const BATCH_SIZE: usize = 32;
const WARMUP_PERIOD: usize = 200;
const TARGET_UPDATE_INTERVAL: usize = 100;
const SNAPSHOT_INTERVAL: usize = 1000;
const REPLAY_BUFFER_CAPACITY: usize = 5000;
const N_EPISODES_PER_EVAL: usize = 5;

/// A chain of states. The agent starts at the left end and gets +1 when it
/// reaches the right end. Running out of time gives -1.
struct Chain {
    pos: usize,
    n_steps: usize,
}

impl Chain {
    fn new() -> Self {
        Self { pos: 0, n_steps: 0 }
    }

    fn obs(&self) -> Vec<u8> {
        vec![(self.pos * 255 / (CHAIN_LEN - 1)) as u8]
    }

    fn reset(&mut self) -> Vec<u8> {
        self.pos = 0;
        self.n_steps = 0;
        self.obs()
    }

    /// Returns the next observation, the reward and the terminal flag.
    fn step(&mut self, action: ActionId) -> (Vec<u8>, i8, bool) {
        self.n_steps += 1;
        self.pos = match action {
            LEFT => self.pos.saturating_sub(1),
            _ => (self.pos + 1).min(CHAIN_LEN - 1),
        };
        if self.pos == CHAIN_LEN - 1 {
            (self.obs(), 1, true)
        } else if self.n_steps >= MAX_EPISODE_STEPS {
            (self.obs(), -1, true)
        } else {
            (self.obs(), 0, false)
        }
    }
}

/// Train DQN agent on a chain environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of environment steps for training
    #[arg(short, long, default_value_t = 5000)]
    steps: usize,

    /// Directory where snapshots of the model are saved
    #[arg(short, long)]
    model_dir: Option<String>,

    /// Use CUDA device if available
    #[arg(short, long, default_value_t = false)]
    cuda: bool,
}

fn create_agent_config(args: &Args) -> DqnConfig<MlpConfig> {
    let model_config = DqnModelConfig::default()
        .q_config(MlpConfig::new(0, vec![64, 64], 0))
        .opt_config(OptimizerConfig::Adam { lr: LR });
    let config = DqnConfig::default()
        .model_config(model_config)
        .use_accelerated_device(args.cuda)
        .actions(vec![LEFT, RIGHT])
        .hist_size(HIST_SIZE)
        .state_dim(1)
        .batch_size(BATCH_SIZE)
        .buffer_capacity(REPLAY_BUFFER_CAPACITY)
        .target_update_interval(TARGET_UPDATE_INTERVAL)
        .snapshot_interval(SNAPSHOT_INTERVAL)
        .min_transitions_warmup(WARMUP_PERIOD)
        .explorer(EpsilonGreedy::with_final_step(args.steps / 2).eps_final(0.05));
    match &args.model_dir {
        Some(dir) => config.model_dir(dir),
        None => config,
    }
}

fn train(agent: &mut Dqn<DqnModel<Mlp>>, n_steps: usize) -> Result<()> {
    let mut env = Chain::new();
    let mut frames = FrameStack::new(HIST_SIZE, 1)?;
    frames.fill(&env.reset())?;
    let (mut n_episodes, mut n_successes) = (0, 0);

    for t in 0..n_steps {
        let state = frames.state();
        let (action, _) = agent.sample(&state, t)?;
        let (obs, reward, terminal) = env.step(action);
        frames.push(&obs)?;
        let transition = Transition {
            state,
            action,
            reward,
            next_state: frames.state(),
            terminal,
        };
        let record = agent.observe(t, &transition)?;

        if terminal {
            n_episodes += 1;
            if reward > 0 {
                n_successes += 1;
            }
            frames.fill(&env.reset())?;
        }
        if t % 500 == 0 {
            if let (Ok(loss), Ok(q)) = (
                record.get_scalar("loss"),
                record.get_array1("q_action_mean"),
            ) {
                info!(
                    "step = {}, loss = {:.5}, q = {:?}, episodes = {}, successes = {}",
                    t, loss, q, n_episodes, n_successes
                );
            }
        }
    }

    Ok(())
}

/// Returns the average number of steps to reach the right end with the greedy policy.
fn eval(agent: &mut Dqn<DqnModel<Mlp>>) -> Result<f32> {
    let mut env = Chain::new();
    let mut frames = FrameStack::new(HIST_SIZE, 1)?;
    let mut total_steps = 0;

    for _ in 0..N_EPISODES_PER_EVAL {
        frames.fill(&env.reset())?;
        loop {
            let (action, _) = agent.select(&frames.state(), 0.0)?;
            let (obs, _, terminal) = env.step(action);
            frames.push(&obs)?;
            total_steps += 1;
            if terminal {
                break;
            }
        }
    }

    Ok(total_steps as f32 / N_EPISODES_PER_EVAL as f32)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut agent = Dqn::<DqnModel<Mlp>>::build(create_agent_config(&args))?;
    train(&mut agent, args.steps)?;
    let avg_steps = eval(&mut agent)?;
    info!(
        "Average episode length of the greedy policy: {} (optimal: {})",
        avg_steps,
        CHAIN_LEN - 1
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_dqn_chain() -> Result<()> {
        let tmp_dir = TempDir::new("dqn_chain")?;
        let args = Args {
            steps: 1200,
            model_dir: Some(tmp_dir.path().to_string_lossy().into_owned()),
            cuda: false,
        };
        let mut agent = Dqn::<DqnModel<Mlp>>::build(create_agent_config(&args))?;
        train(&mut agent, args.steps)?;
        assert!(tmp_dir.path().join("1000model").exists());

        agent.load_model(1000)?;
        let _ = eval(&mut agent)?;
        Ok(())
    }
}
