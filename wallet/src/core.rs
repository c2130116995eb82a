use anyhow::Result;
use chaincore::crypto::{PrivateKey, PublicKey};
use chaincore::network::Message;
use chaincore::sha256::Hash;
use chaincore::types::transaction::{sign_input, Address, Amount, Transaction, TransactionOutput};
use crossbeam_skiplist::SkipMap;
use kanal::Sender;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Represent a key pair with paths to public and private keys.
#[derive(Serialize, Deserialize, Clone)]
pub struct Key {
    pub public: PathBuf,
    pub private: PathBuf,
}
/// Represent a recipient with a name and a path to their public key.
#[derive(Serialize, Deserialize, Clone)]
pub struct Recipient {
    pub name: String,
    pub key: PathBuf,
}

/// Represent a loaded key pair with its derived address.
#[derive(Clone)]
struct LoadedKey {
    address: Address,
    private: PrivateKey,
}

#[derive(Clone)]
pub struct LoadedRecipient {
    #[allow(dead_code)]
    pub name: String,
    pub address: Address,
}

impl Recipient {
    pub fn load(&self) -> Result<LoadedRecipient> {
        let key = PublicKey::load_from_file(&self.key)?;
        Ok(LoadedRecipient {
            name: self.name.clone(),
            address: Address::from(key),
        })
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub enum FeeType {
    Fixed,
    Percent,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct FeeConfig {
    pub fee_type: FeeType,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    pub my_keys: Vec<Key>,
    pub contacts: Vec<Recipient>,
    pub default_node: String,
    pub fee_config: FeeConfig,
}

impl Config {
    /// A minimal config with no keys or contacts, for `wallet generate-config`.
    pub fn dummy() -> Self {
        Config {
            my_keys: vec![],
            contacts: vec![],
            default_node: "127.0.0.1:9000".to_string(),
            fee_config: FeeConfig {
                fee_type: FeeType::Fixed,
                value: 1.0,
            },
        }
    }
}

/// A UTXO's ledger key, its output, and whether a pending transaction already reserves it.
type OwnedUtxo = ((Hash, u32), TransactionOutput, bool);

#[derive(Clone)]
struct UtxoStore {
    my_keys: Vec<LoadedKey>,
    utxos: Arc<SkipMap<Address, Vec<OwnedUtxo>>>,
}

impl UtxoStore {
    fn new() -> Self {
        Self {
            my_keys: vec![],
            utxos: Arc::new(SkipMap::new()),
        }
    }
    fn add_key(&mut self, key: LoadedKey) {
        self.my_keys.push(key);
    }
}

#[derive(Clone)]
pub struct Core {
    pub config: Config,
    utxos: UtxoStore,
    pub tx_sender: Sender<Transaction>,
    pub stream: Arc<Mutex<TcpStream>>,
}

impl Core {
    fn new(config: Config, utxos: UtxoStore, stream: TcpStream) -> Self {
        let (tx_sender, _) = kanal::bounded(10);
        Core {
            config,
            utxos,
            tx_sender,
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Load the Core from a configuration file
    pub async fn load(config_path: PathBuf) -> Result<Self> {
        info!("Loading core from config: {:?}", config_path);
        let config: Config = toml::from_str(&fs::read_to_string(&config_path)?)?;
        let mut utxos = UtxoStore::new();
        let stream = TcpStream::connect(&config.default_node).await?;
        for key in &config.my_keys {
            debug!("Loading key pair: {:?}", key.public);
            let public = PublicKey::load_from_file(&key.public)?;
            let private = PrivateKey::load_from_file(&key.private)?;
            utxos.add_key(LoadedKey {
                address: Address::from(public),
                private,
            });
        }
        Ok(Core::new(config, utxos, stream))
    }

    /// Fetch UTXOs from the node for all loaded keys.
    pub async fn fetch_utxos(&self) -> Result<()> {
        debug!("Fetching UTXOs from node: {}", self.config.default_node);
        for key in &self.utxos.my_keys {
            let message = Message::FetchUtxos(key.address);
            message.send_async(&mut *self.stream.lock().await).await?;
            if let Message::Utxos(utxos) = Message::receive_async(&mut *self.stream.lock().await).await? {
                debug!("Received {} UTXOs for address: {:?}", utxos.len(), key.address);
                self.utxos.utxos.insert(key.address, utxos);
            } else {
                error!("Unexpected response from node");
                return Err(anyhow::anyhow!("Unexpected response from node"));
            }
        }
        info!("UTXOs fetched successfully");
        Ok(())
    }

    /// Send a transaction to the node.
    pub async fn send_transaction(&self, transaction: Transaction) -> Result<()> {
        debug!("Sending transaction to node: {}", self.config.default_node);
        let message = Message::SubmitTransaction(transaction);
        message.send_async(&mut *self.stream.lock().await).await?;
        info!("Transaction sent successfully");
        Ok(())
    }

    /// Prepare and send a transaction asynchronously.
    pub fn send_transaction_async(&self, recipient: &str, amount: u64) -> Result<()> {
        info!("Preparing to send {} coins to {}", amount, recipient);
        let recipient_address = self
            .config
            .contacts
            .iter()
            .find(|r| r.name == recipient)
            .ok_or_else(|| anyhow::anyhow!("Recipient not found"))?
            .load()?
            .address;
        let transaction = self.create_transaction(recipient_address, Amount::from_whole(amount))?;
        debug!("Sending transaction asynchronously");
        self.tx_sender.send(transaction)?;
        Ok(())
    }

    /// Creates a transaction by selecting UTXOs and signing each as an input.
    ///
    /// Greedy coin selection: walk the unreserved UTXOs across every loaded
    /// key until the payment plus fee is covered, then spend exactly those.
    pub fn create_transaction(&self, recipient: Address, amount: Amount) -> Result<Transaction> {
        let fee = self.calculate_fee(&amount);
        let total_needed = amount.clone() + fee;

        let mut inputs = Vec::new();
        let mut input_sum = Amount::zero();

        'outer: for entry in self.utxos.utxos.iter() {
            let address = *entry.key();
            let Some(key) = self.utxos.my_keys.iter().find(|k| k.address == address) else {
                continue;
            };
            for ((prev_id, prev_index), utxo, reserved) in entry.value().iter() {
                if *reserved {
                    continue;
                }
                if input_sum >= total_needed {
                    break 'outer;
                }
                inputs.push(sign_input(*prev_id, *prev_index, &key.private));
                input_sum = input_sum + utxo.amount.clone();
            }
        }

        if input_sum < total_needed {
            return Err(anyhow::anyhow!("Insufficient funds"));
        }

        let mut outputs = vec![TransactionOutput {
            to_address: recipient,
            amount: amount.clone(),
        }];
        if input_sum > total_needed {
            outputs.push(TransactionOutput {
                to_address: self.utxos.my_keys[0].address,
                amount: input_sum - total_needed,
            });
        }

        Ok(Transaction::new(inputs, outputs))
    }

    pub fn get_balance(&self) -> Amount {
        self.utxos
            .utxos
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|(_, _, reserved)| !*reserved)
                    .map(|(_, utxo, _)| utxo.amount.clone())
                    .collect::<Vec<_>>()
            })
            .sum()
    }

    fn calculate_fee(&self, amount: &Amount) -> Amount {
        match self.config.fee_config.fee_type {
            FeeType::Fixed => Amount::from_whole(self.config.fee_config.value as u64),
            FeeType::Percent => {
                let whole: f64 = amount.0.to_string().parse().unwrap_or(0.0);
                Amount::from_whole((whole * self.config.fee_config.value / 100.0) as u64)
            }
        }
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod core_tests;
