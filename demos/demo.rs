use std::{
    sync::{
        atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use matim::{
    client::{Client, ClientConfig},
    clusters::defs,
    error::{InvokeError, SessionError},
    invoke::{Destination, InvokeOptions},
    paths::{AttributePath, CommandPath, PathSet},
    report::{encode_attribute_entry, Value},
    subscription::SubscribeOptions,
    transport::{
        InvokeResponse, SessionHandle, SessionTransport, SubscribeAck, TerminationReason,
        TransportEvent,
    },
};

const DEFAULT_NODE_ID: u64 = 0x1234;

#[derive(Parser, Debug)]
#[command()]
struct Cli {
    #[clap(long)]
    #[arg(global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Subscribe to the on/off attribute of a simulated device
    Subscribe {
        #[clap(long)]
        #[arg(default_value_t = DEFAULT_NODE_ID)]
        node_id: u64,
    },
    /// Invoke Toggle and door lock GetUser on a simulated device
    Invoke {
        #[clap(long)]
        #[arg(default_value_t = DEFAULT_NODE_ID)]
        node_id: u64,
    },
    /// Send a group Toggle (fire-and-forget)
    InvokeGroup {
        #[clap(long)]
        #[arg(default_value_t = 5)]
        group_id: u16,
    },
}

/// In-process device: answers sessions immediately, pushes alternating
/// on/off reports and drops the first subscription once to demonstrate
/// automatic resubscription.
struct SimulatedDevice {
    next_session_id: AtomicU16,
    next_subscription_id: AtomicU32,
    dropped_once: AtomicBool,
}

impl SimulatedDevice {
    fn new() -> Self {
        Self {
            next_session_id: AtomicU16::new(1),
            next_subscription_id: AtomicU32::new(42),
            dropped_once: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionTransport for SimulatedDevice {
    async fn open_session(&self, node_id: u64) -> Result<SessionHandle, SessionError> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        log::debug!("simulated session {} to node {}", session_id, node_id);
        Ok(SessionHandle::new(node_id, session_id))
    }

    async fn send_subscribe_request(
        &self,
        _session: &Arc<SessionHandle>,
        _paths: &PathSet,
        _min_interval_s: u16,
        _max_interval_s: u16,
    ) -> Result<SubscribeAck, SessionError> {
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = tokio::sync::mpsc::channel(32);
        let drop_this_one = !self.dropped_once.swap(true, Ordering::SeqCst);
        tokio::spawn(async move {
            let path = AttributePath {
                endpoint_id: 1,
                cluster_id: defs::CLUSTER_ID_ON_OFF,
                attribute_id: defs::CLUSTER_ON_OFF_ATTR_ID_ONOFF,
            };
            let mut state = false;
            for i in 0u32.. {
                tokio::time::sleep(Duration::from_millis(400)).await;
                state = !state;
                let entry = encode_attribute_entry(&path, &Value::Bool(state));
                // deliver in two chunks to exercise incremental decoding
                let (head, tail) = entry.split_at(entry.len() / 2);
                if tx.try_send(TransportEvent::ReportChunk(head.to_vec())).is_err() {
                    break;
                }
                if tx.try_send(TransportEvent::ReportChunk(tail.to_vec())).is_err() {
                    break;
                }
                if drop_this_one && i == 4 {
                    _ = tx
                        .try_send(TransportEvent::Terminated {
                            reason: TerminationReason::LinkLoss,
                            retry_delay: Some(Duration::from_millis(300)),
                        });
                    break;
                }
            }
        });
        Ok(SubscribeAck {
            subscription_id,
            events,
        })
    }

    async fn send_invoke_request(
        &self,
        session: &Arc<SessionHandle>,
        path: &CommandPath,
        _payload: &[u8],
        _timed_interaction_timeout_s: Option<u16>,
    ) -> Result<InvokeResponse, InvokeError> {
        log::debug!(
            "simulated invoke on node {}: cluster {} command {}",
            session.node_id,
            path.cluster_id,
            path.command_id
        );
        if path.cluster_id == defs::CLUSTER_ID_DOOR_LOCK
            && path.command_id == defs::CLUSTER_DOOR_LOCK_CMD_ID_GETUSER
        {
            // GetUserResponse for user 1, "alice", no credential
            let mut payload = Vec::new();
            payload.extend_from_slice(&1u16.to_le_bytes());
            payload.push(5);
            payload.extend_from_slice(b"alice");
            payload.push(1);
            payload.push(0);
            payload.push(0);
            payload.push(0);
            return Ok(InvokeResponse {
                path: CommandPath {
                    endpoint_id: path.endpoint_id,
                    cluster_id: defs::CLUSTER_ID_DOOR_LOCK,
                    command_id: defs::CLUSTER_DOOR_LOCK_CMD_ID_GETUSER_RESPONSE,
                },
                status: 0,
                payload,
            });
        }
        Ok(InvokeResponse {
            path: *path,
            status: 0,
            payload: Vec::new(),
        })
    }

    async fn send_group_invoke(
        &self,
        group_id: u16,
        fabric_index: u8,
        path: &CommandPath,
        _payload: &[u8],
    ) -> Result<(), InvokeError> {
        log::debug!(
            "simulated group invoke: group {} fabric {} cluster {} command {}",
            group_id,
            fabric_index,
            path.cluster_id,
            path.command_id
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    let device = Arc::new(SimulatedDevice::new());
    let client = Client::new(device, ClientConfig::default());

    match cli.command {
        Commands::Subscribe { node_id } => {
            let paths = PathSet::single_attribute(
                1,
                defs::CLUSTER_ID_ON_OFF,
                defs::CLUSTER_ON_OFF_ATTR_ID_ONOFF,
            );
            let mut options = SubscribeOptions::new(1, 10);
            options.on_established = Some(Box::new(|id| {
                log::info!("subscription {} established", id);
            }));
            options.on_attribute = Some(Box::new(|report| {
                log::info!("report {:?} = {:?} ({:?})", report.path, report.value, report.status);
            }));
            options.on_done = Some(Box::new(|node, id| {
                log::info!("subscription {} to node {} done", id, node);
            }));
            options.on_connection_failed = Some(Box::new(|node, error| {
                log::info!("connection to node {} failed: {}", node, error);
            }));
            client.subscribe(node_id, paths, options)?;

            // let reports (and one forced resubscription) play out
            tokio::time::sleep(Duration::from_secs(6)).await;
            client.unsubscribe_everything();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Commands::Invoke { node_id } => {
            client
                .invoke_command(
                    Destination::Node(node_id),
                    CommandPath {
                        endpoint_id: 1,
                        cluster_id: defs::CLUSTER_ID_ON_OFF,
                        command_id: defs::CLUSTER_ON_OFF_CMD_ID_TOGGLE,
                    },
                    &[],
                    InvokeOptions::default(),
                )
                .await?;
            log::info!("toggle acknowledged");

            // decoded GetUserResponse appears through the inspection sink
            client
                .invoke_command(
                    Destination::Node(node_id),
                    CommandPath {
                        endpoint_id: 1,
                        cluster_id: defs::CLUSTER_ID_DOOR_LOCK,
                        command_id: defs::CLUSTER_DOOR_LOCK_CMD_ID_GETUSER,
                    },
                    &1u16.to_le_bytes(),
                    InvokeOptions::default(),
                )
                .await?;
        }
        Commands::InvokeGroup { group_id } => {
            client
                .invoke_command(
                    Destination::Group { group_id, fabric_index: None },
                    CommandPath {
                        endpoint_id: 1,
                        cluster_id: defs::CLUSTER_ID_ON_OFF,
                        command_id: defs::CLUSTER_ON_OFF_CMD_ID_TOGGLE,
                    },
                    &[],
                    InvokeOptions::default(),
                )
                .await?;
            log::info!("group toggle enqueued (no response expected)");
        }
    }
    Ok(())
}
