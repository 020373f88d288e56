use anyhow::Result;
use qlearn_candle_agent::{
    dqn::{argmax, Dqn, DqnConfig, DqnModel, DqnModelConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    util::NamedTensors,
    QFunction,
};
use qlearn_core::{QlearnError, State, Transition};
use std::path::Path;
use tempdir::TempDir;

const HIST_SIZE: usize = 1;
const DIM: usize = 2;
const GOOD: i64 = 7;
const BAD: i64 = 3;

type Agent = Dqn<DqnModel<Mlp>>;

fn create_config() -> DqnConfig<MlpConfig> {
    let model_config = DqnModelConfig::default()
        .q_config(MlpConfig::new(0, vec![32, 32], 0))
        .opt_config(OptimizerConfig::Adam { lr: 0.01 });
    DqnConfig::default()
        .model_config(model_config)
        .actions(vec![BAD, GOOD])
        .hist_size(HIST_SIZE)
        .state_dim(DIM)
        .batch_size(8)
        .buffer_capacity(64)
        .target_update_interval(3)
        .snapshot_interval(4)
        .min_transitions_warmup(1)
        .explorer(EpsilonGreedy::with_final_step(100))
        .seed(42)
}

fn state() -> State {
    State::new(HIST_SIZE, DIM, vec![100, 200]).unwrap()
}

/// One-step bandit: the good action ends the episode with +1, the bad one with -1.
fn transition(action: i64) -> Transition {
    let reward = if action == GOOD { 1 } else { -1 };
    Transition {
        state: state(),
        action,
        reward,
        next_state: State::zeros(HIST_SIZE, DIM),
        terminal: true,
    }
}

fn params_diff(p1: &NamedTensors, p2: &NamedTensors) -> f32 {
    p1.max_abs_diff(p2).unwrap()
}

fn qlearn_error(err: &anyhow::Error) -> Option<&QlearnError> {
    err.downcast_ref::<QlearnError>()
}

#[test_log::test]
fn test_target_is_synchronized_on_interval() -> Result<()> {
    let mut agent = Agent::build(create_config())?;
    assert_eq!(params_diff(&agent.qnet().parameters()?, &agent.qnet_tgt().parameters()?), 0.0);
    let mut synced = agent.qnet_tgt().parameters()?;

    for t in 0..10 {
        let action = if t % 2 == 0 { GOOD } else { BAD };
        let record = agent.observe(t, &transition(action))?;
        let online = agent.qnet().parameters()?;
        let target = agent.qnet_tgt().parameters()?;

        if t % 3 == 0 {
            assert!(record.get("synced").is_some());
            assert_eq!(params_diff(&online, &target), 0.0);
            synced = target;
        } else {
            assert!(record.get("synced").is_none());
            assert_eq!(params_diff(&synced, &target), 0.0);
            assert!(params_diff(&online, &target) > 0.0);
        }
    }
    assert_eq!(agent.n_opts(), 9);
    Ok(())
}

#[test_log::test]
fn test_greedy_selection_is_deterministic() -> Result<()> {
    let mut agent = Agent::build(create_config())?;
    for t in 0..5 {
        agent.observe(t, &transition(GOOD))?;
    }

    let (a0, q0) = agent.select(&state(), 0.0)?;
    assert_eq!(q0.len(), 2);
    assert_eq!(a0, agent.actions().index_to_action(argmax(&q0))?);
    for _ in 0..10 {
        let (a, q) = agent.select(&state(), 0.0)?;
        assert_eq!(a, a0);
        assert_eq!(q, q0);
    }
    Ok(())
}

#[test_log::test]
fn test_select_rejects_wrong_state_shape() -> Result<()> {
    let mut agent = Agent::build(create_config())?;
    let state = State::new(2, 1, vec![0, 0])?;
    let err = agent.select(&state, 0.0).unwrap_err();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test_log::test]
fn test_replay_without_history() -> Result<()> {
    let mut agent = Agent::build(create_config())?;
    let err = agent.experience_replay(0).unwrap_err();
    assert_eq!(qlearn_error(&err), Some(&QlearnError::InsufficientHistory(0)));
    Ok(())
}

#[test_log::test]
fn test_warmup() -> Result<()> {
    let mut agent = Agent::build(create_config().min_transitions_warmup(5))?;
    for t in 0..8 {
        let record = agent.observe(t, &transition(GOOD))?;
        assert_eq!(record.get("loss").is_some(), t >= 5);
        if t >= 5 {
            assert_eq!(record.get_array1("q_action_mean")?.len(), 2);
        }
    }
    assert_eq!(agent.n_opts(), 3);
    Ok(())
}

#[test_log::test]
fn test_invalid_config() {
    let err = Agent::build(create_config().actions(vec![])).err().unwrap();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::InvalidConfig(_))
    ));

    let err = Agent::build(create_config().target_update_interval(0))
        .err()
        .unwrap();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::InvalidConfig(_))
    ));
}

fn train(agent: &mut Agent, n_steps: usize) -> Result<()> {
    for t in 0..n_steps {
        let (action, _) = agent.select(&state(), 1.0)?;
        agent.observe(t, &transition(action))?;
    }
    Ok(())
}

#[test_log::test]
fn test_save_and_load_model() -> Result<()> {
    let dir = TempDir::new("dqn")?;
    let model_dir = dir.path().join("model");
    let mut agent1 = Agent::build(create_config().model_dir(&model_dir))?;
    train(&mut agent1, 10)?;
    agent1.save_model(10)?;
    assert!(Path::new(&model_dir).join("10model").exists());

    let mut agent2 = Agent::build(create_config().model_dir(&model_dir))?;
    assert!(params_diff(&agent1.qnet().parameters()?, &agent2.qnet().parameters()?) > 0.0);
    agent2.load_model(10)?;

    let online = agent2.qnet().parameters()?;
    assert_eq!(params_diff(&agent1.qnet().parameters()?, &online), 0.0);
    assert_eq!(params_diff(&agent2.qnet_tgt().parameters()?, &online), 0.0);
    assert_eq!(agent1.select(&state(), 0.0)?, agent2.select(&state(), 0.0)?);
    Ok(())
}

#[test_log::test]
fn test_load_model_of_other_architecture() -> Result<()> {
    let dir = TempDir::new("dqn")?;
    let mut agent1 = Agent::build(create_config().model_dir(dir.path()))?;
    train(&mut agent1, 5)?;
    agent1.save_model(10)?;

    let model_config = DqnModelConfig::default()
        .q_config(MlpConfig::new(0, vec![32, 16], 0))
        .opt_config(OptimizerConfig::Adam { lr: 0.01 });
    let mut agent2 = Agent::build(
        create_config()
            .model_config(model_config)
            .model_dir(dir.path()),
    )?;
    train(&mut agent2, 5)?;
    let online = agent2.qnet().parameters()?;
    let target = agent2.qnet_tgt().parameters()?;
    assert!(params_diff(&online, &target) > 0.0);

    let err = agent2.load_model(10).unwrap_err();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::PersistenceFailure { id, .. }) if id == "10model"
    ));
    assert_eq!(params_diff(&agent2.qnet().parameters()?, &online), 0.0);
    assert_eq!(params_diff(&agent2.qnet_tgt().parameters()?, &target), 0.0);
    Ok(())
}

#[test_log::test]
fn test_snapshots_on_interval() -> Result<()> {
    let dir = TempDir::new("dqn")?;
    let mut agent = Agent::build(create_config().model_dir(dir.path()))?;
    for t in 0..9 {
        let record = agent.observe(t, &transition(GOOD))?;
        assert_eq!(record.get("saved").is_some(), t == 4 || t == 8);
    }
    assert!(dir.path().join("4model").exists());
    assert!(dir.path().join("8model").exists());
    assert!(!dir.path().join("0model").exists());
    Ok(())
}

#[test_log::test]
fn test_persistence_failures() -> Result<()> {
    let dir = TempDir::new("dqn")?;
    let mut agent = Agent::build(create_config().model_dir(dir.path()))?;
    let err = agent.load_model(123).unwrap_err();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::PersistenceFailure { id, .. }) if id == "123model"
    ));

    let agent = Agent::build(create_config())?;
    let err = agent.save_model(1).unwrap_err();
    assert!(matches!(
        qlearn_error(&err),
        Some(QlearnError::PersistenceFailure { .. })
    ));
    Ok(())
}

#[test_log::test]
fn test_learns_rewarding_action() -> Result<()> {
    let mut agent = Agent::build(create_config())?;
    train(&mut agent, 300)?;

    let (action, q) = agent.select(&state(), 0.0)?;
    assert_eq!(action, GOOD);
    assert!(q[1] > 0.5, "{:?}", q);
    assert!(q[0] < -0.5, "{:?}", q);
    Ok(())
}
