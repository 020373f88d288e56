//! DQN agent implemented with candle.
use super::{config::DqnConfig, explorer::epsilon_greedy_index, loss::td_loss, EpsilonGreedy};
use super::{DqnModel, DqnModelConfig};
use crate::{
    model::SubModel1,
    persistence::{failure, snapshot_id, SafetensorsStore, SnapshotStore},
    util::IoDim,
    QFunction,
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use log::{debug, error, info};
use qlearn_core::{
    record::{Record, RecordValue},
    ActionId, ActionSet, QlearnError, ReplayBuffer, ReplayBufferConfig, State, Transition,
};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};

#[allow(clippy::upper_case_acronyms)]
#[cfg_attr(doc, aquamarine::aquamarine)]
/// DQN agent.
///
/// The agent owns the replay buffer, the online action-value function and a
/// frozen copy of it, the target network.
///
/// ```mermaid
/// graph LR
///     E[Environment] -->|state| S[Dqn::sample]
///     S -->|action| E
///     E -->|transition| O[Dqn::observe]
///     O --> R[ReplayBuffer::record]
///     O -->|time >= warmup| X[Dqn::experience_replay]
///     R -.-> X
///     X -->|gradient step| Q[online]
///     O -->|time % target_update_interval == 0| T[target = online.try_clone]
///     O -->|time % snapshot_interval == 0| P[SnapshotStore::save]
/// ```
///
/// `F` is the type of the action-value function. [`Dqn::build`] constructs
/// the agent with [`DqnModel`], [`Dqn::with_qfunction`] with any
/// [`QFunction`].
pub struct Dqn<F: QFunction> {
    qnet: F,
    qnet_tgt: F,
    buffer: ReplayBuffer,
    actions: ActionSet,
    explorer: EpsilonGreedy,
    gamma: f64,
    batch_size: usize,
    hist_size: usize,
    dim: usize,
    target_update_interval: usize,
    snapshot_interval: usize,
    min_transitions_warmup: usize,
    n_opts: usize,
    store: Option<Box<dyn SnapshotStore>>,
    rng: SmallRng,
}

impl<Q> Dqn<DqnModel<Q>>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + IoDim + Clone,
{
    /// Constructs DQN agent with [`DqnModel`].
    ///
    /// The shape of states and the number of actions in `config` override
    /// those in the model configuration.
    pub fn build(config: DqnConfig<Q::Config>) -> Result<Self> {
        let device = config.device.create()?;
        let model_config: DqnModelConfig<Q::Config> = config
            .model_config
            .clone()
            .state_shape(config.hist_size, config.state_dim)
            .out_dim(config.actions.len());
        let qnet = DqnModel::build(model_config, device)?;
        info!("Build DQN agent on {:?}", config.device);
        Self::with_qfunction(config, qnet)
    }
}

impl<F: QFunction> Dqn<F> {
    /// Constructs DQN agent with the given online action-value function.
    ///
    /// The target network is created as a copy of `qnet`. The model
    /// configuration in `config` is not used.
    pub fn with_qfunction<C: IoDim>(config: DqnConfig<C>, qnet: F) -> Result<Self> {
        let actions = ActionSet::new(config.actions)?;
        if config.batch_size == 0
            || config.target_update_interval == 0
            || config.snapshot_interval == 0
        {
            return Err(QlearnError::InvalidConfig(format!(
                "batch_size ({}), target_update_interval ({}) and snapshot_interval ({}) must be positive",
                config.batch_size, config.target_update_interval, config.snapshot_interval
            ))
            .into());
        }
        let buffer = ReplayBuffer::build(
            &ReplayBufferConfig::default()
                .capacity(config.buffer_capacity)
                .hist_size(config.hist_size)
                .dim(config.state_dim)
                .seed(config.seed),
        )?;
        let store = config
            .model_dir
            .map(|dir| Box::new(SafetensorsStore::new(dir)) as Box<dyn SnapshotStore>);
        let qnet_tgt = qnet.try_clone()?;

        Ok(Self {
            qnet,
            qnet_tgt,
            buffer,
            actions,
            explorer: config.explorer,
            gamma: config.gamma,
            batch_size: config.batch_size,
            hist_size: config.hist_size,
            dim: config.state_dim,
            target_update_interval: config.target_update_interval,
            snapshot_interval: config.snapshot_interval,
            min_transitions_warmup: config.min_transitions_warmup,
            n_opts: 0,
            store,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    /// Replaces the snapshot store.
    pub fn store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stores a transition at step `time`.
    pub fn record(&mut self, time: usize, transition: &Transition) -> Result<()> {
        self.buffer.record(time, transition)
    }

    /// Performs one gradient step of the online network on a mini-batch
    /// sampled from the transitions stored before `time`.
    ///
    /// Fails with [`QlearnError::InsufficientHistory`] if `time == 0`.
    pub fn experience_replay(&mut self, time: usize) -> Result<Record> {
        let batch = self.buffer.sample(self.batch_size, time)?;
        let (loss, q) = td_loss(&self.qnet, &self.qnet_tgt, &batch, &self.actions, self.gamma)?;
        self.qnet.gradient_step(&loss)?;
        self.n_opts += 1;

        let loss = loss.to_scalar::<f32>()?;
        let q = q.detach();
        let q_mean = q.mean_all()?.to_scalar::<f32>()?;
        let q_action_mean = q.mean(0)?.to_vec1::<f32>()?;
        debug!("time = {}, loss = {}, q_mean = {}", time, loss, q_mean);

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("q_mean", RecordValue::Scalar(q_mean)),
            ("q_action_mean", RecordValue::Array1(q_action_mean)),
        ]))
    }

    /// Selects an action for `state` with the epsilon-greedy rule.
    ///
    /// Returns the action and the action values of the online network.
    pub fn select(&mut self, state: &State, epsilon: f64) -> Result<(ActionId, Vec<f32>)> {
        state.check_shape(self.hist_size, self.dim)?;
        let xs = state.data().iter().map(|&v| v as f32).collect::<Vec<_>>();
        let xs = Tensor::from_vec(xs, (1, self.hist_size, self.dim), &Device::Cpu)?;
        let q = self
            .qnet
            .evaluate(&xs)?
            .to_vec2::<f32>()?
            .into_iter()
            .next()
            .unwrap_or_default();
        if q.len() != self.actions.len() {
            return Err(QlearnError::ShapeMismatch {
                expected: vec![1, self.actions.len()],
                got: vec![1, q.len()],
            }
            .into());
        }

        let ix = epsilon_greedy_index(&q, epsilon, &mut self.rng);
        Ok((self.actions.index_to_action(ix)?, q))
    }

    /// Selects an action with epsilon given by the schedule of the explorer at `time`.
    pub fn sample(&mut self, state: &State, time: usize) -> Result<(ActionId, Vec<f32>)> {
        let epsilon = self.explorer.epsilon(time);
        self.select(state, epsilon)
    }

    /// Copies the online network into the target network if `step` is a
    /// multiple of the target update interval.
    ///
    /// Returns `true` if the target network was replaced.
    pub fn maybe_sync(&mut self, step: usize) -> Result<bool> {
        if step % self.target_update_interval == 0 {
            self.sync_target()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Replaces the target network with a copy of the online network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.qnet_tgt = self.qnet.try_clone()?;
        info!("Synchronize target network (n_opts = {})", self.n_opts);
        Ok(())
    }

    /// Saves the parameters of the online network as the snapshot of `step`.
    pub fn save_model(&self, step: usize) -> Result<()> {
        let id = snapshot_id(step);
        let store = self.snapshot_store(&id)?;
        store.save(&id, &self.qnet.parameters()?)
    }

    /// Loads the snapshot of `step` into the online network and copies it into
    /// the target network.
    ///
    /// A snapshot that does not fit the online network is reported as
    /// [`QlearnError::PersistenceFailure`] and both networks are left as they were.
    pub fn load_model(&mut self, step: usize) -> Result<()> {
        let id = snapshot_id(step);
        let params = self.snapshot_store(&id)?.load(&id)?;
        self.qnet
            .load_parameters(&params)
            .map_err(|e| failure(&id, e))?;
        self.sync_target()
    }

    fn snapshot_store(&self, id: &str) -> Result<&dyn SnapshotStore> {
        match &self.store {
            Some(store) => Ok(store.as_ref()),
            None => {
                error!("No snapshot store is given for {}", id);
                Err(QlearnError::PersistenceFailure {
                    id: id.to_string(),
                    reason: "no snapshot store".to_string(),
                }
                .into())
            }
        }
    }

    /// Processes the transition observed at step `time`.
    ///
    /// The transition is recorded, then one experience replay is performed if
    /// `time` has reached the warmup, the target network is synchronized and a
    /// snapshot is saved on their intervals. The returned record has `loss`,
    /// `q_mean` and the per-action `q_action_mean` if replay was performed, and
    /// `synced` or `saved` set to 1 if the respective action was taken.
    pub fn observe(&mut self, time: usize, transition: &Transition) -> Result<Record> {
        self.record(time, transition)?;

        let mut record = Record::empty();
        if time > 0 && time >= self.min_transitions_warmup {
            record.merge_inplace(self.experience_replay(time)?);
        }
        if self.maybe_sync(time)? {
            record.insert("synced", RecordValue::Scalar(1.0));
        }
        if time > 0 && time % self.snapshot_interval == 0 && self.store.is_some() {
            self.save_model(time)?;
            record.insert("saved", RecordValue::Scalar(1.0));
        }
        Ok(record)
    }

    /// Returns the online action-value function.
    pub fn qnet(&self) -> &F {
        &self.qnet
    }

    /// Returns the online action-value function.
    pub fn qnet_mut(&mut self) -> &mut F {
        &mut self.qnet
    }

    /// Returns the target action-value function.
    pub fn qnet_tgt(&self) -> &F {
        &self.qnet_tgt
    }

    /// Returns the replay buffer.
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// Returns the legal actions.
    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Returns the number of gradient steps performed so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }
}
