//! Test utils for validator registration.

use {
    super::MockNodeApi,
    crate::{
        api::Validator,
        ids::Id,
        wallet::{SubnetValidator, SubnetValidatorWallet},
    },
    async_trait::async_trait,
    std::sync::{Arc, Mutex},
};

/// Wallet that accepts every transaction. Issued validators are recorded and
/// immediately show up in the subnet's validators of the wrapped API.
pub struct RecordingWallet {
    api: Arc<MockNodeApi>,
    issued: Mutex<Vec<SubnetValidator>>,
}

impl RecordingWallet {
    pub fn new(api: Arc<MockNodeApi>) -> Self {
        Self {
            api,
            issued: Mutex::new(vec![]),
        }
    }

    pub fn issued(&self) -> Vec<SubnetValidator> {
        self.issued
            .lock()
            .expect("Wallet lock is poisoned.")
            .clone()
    }
}

#[async_trait]
impl SubnetValidatorWallet for RecordingWallet {
    async fn issue_add_subnet_validator_tx(
        &self,
        validator: SubnetValidator,
    ) -> anyhow::Result<()> {
        self.api.add_validator(
            validator.subnet_id,
            Validator {
                node_id: validator.node_id,
                weight: validator.weight,
                end_time: validator.end_time,
                tx_id: Id::EMPTY,
            },
        );

        self.issued
            .lock()
            .map_err(|_| anyhow::anyhow!("Wallet lock is poisoned."))?
            .push(validator);

        Ok(())
    }
}
