use alloy_primitives::{Address, U256};
use eth_core::erc20;
use eth_rpc::{ChainClient, ChainState};

use crate::error::TxError;

/// Read-only view of an ERC-20 token contract.
pub struct TokenReader<'a, C: ?Sized> {
    client: &'a C,
    token: Address,
}

impl<'a, C> TokenReader<'a, C>
where
    C: ChainClient + ?Sized,
{
    pub fn new(client: &'a C, token: Address) -> Self {
        Self { client, token }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, TxError> {
        let out = self.read(erc20::encode_balance_of(owner)?).await?;
        Ok(erc20::decode_uint256(&out)?)
    }

    pub async fn total_supply(&self) -> Result<U256, TxError> {
        let out = self.read(erc20::encode_total_supply()?).await?;
        Ok(erc20::decode_uint256(&out)?)
    }

    pub async fn decimals(&self) -> Result<u8, TxError> {
        let out = self.read(erc20::encode_decimals()?).await?;
        Ok(erc20::decode_decimals(&out)?)
    }

    pub async fn symbol(&self) -> Result<String, TxError> {
        let out = self.read(erc20::encode_symbol()?).await?;
        Ok(erc20::decode_symbol(&out)?)
    }

    async fn read(&self, data: Vec<u8>) -> Result<Vec<u8>, TxError> {
        self.client.call(self.token, &data).await.map_err(TxError::Network)
    }
}

/// Native balance of `address` in wei.
pub async fn native_balance<S>(client: &S, address: Address) -> Result<U256, TxError>
where
    S: ChainState + ?Sized,
{
    client.balance(address).await.map_err(TxError::Network)
}
