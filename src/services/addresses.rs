use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::aggregates::{Address, AddressDetails, AddressSnapshot, AddressType};
use crate::ports::AddressRepository;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct AddressService {
    addresses: Arc<dyn AddressRepository>,
}

impl AddressService {
    pub fn new(addresses: Arc<dyn AddressRepository>) -> Self { Self { addresses } }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Address>> {
        Ok(self.addresses.list_addresses(user_id).await?)
    }

    /// The first address of a type becomes its default.
    pub async fn add(&self, user_id: Uuid, details: AddressDetails, make_default: bool) -> Result<Address> {
        info!(%user_id, address_type = details.address_type.as_str(), "adding address");
        let has_default = self
            .addresses
            .list_addresses(user_id)
            .await?
            .iter()
            .any(|a| a.is_default && a.address_type == details.address_type);
        let address = Address::new(user_id, details, make_default || !has_default);
        self.addresses.save_address(&address).await?;
        Ok(address)
    }

    pub async fn update(&self, user_id: Uuid, address_id: Uuid, details: AddressDetails) -> Result<Address> {
        info!(%user_id, %address_id, "updating address");
        let mut address = self.owned(user_id, address_id).await?;
        if address.address_type != details.address_type {
            address.is_default = false;
        }
        address.update(details);
        self.addresses.save_address(&address).await?;
        Ok(address)
    }

    pub async fn delete(&self, user_id: Uuid, address_id: Uuid) -> Result<()> {
        info!(%user_id, %address_id, "deleting address");
        self.owned(user_id, address_id).await?;
        self.addresses.delete_address(address_id).await?;
        Ok(())
    }

    pub async fn set_default(&self, user_id: Uuid, address_id: Uuid) -> Result<Address> {
        info!(%user_id, %address_id, "setting default address");
        let mut address = self.owned(user_id, address_id).await?;
        address.is_default = true;
        self.addresses.save_address(&address).await?;
        Ok(address)
    }

    pub async fn get_default(&self, user_id: Uuid, address_type: AddressType) -> Result<Address> {
        self.addresses
            .list_addresses(user_id)
            .await?
            .into_iter()
            .find(|a| a.is_default && a.address_type == address_type)
            .ok_or_else(|| EcommerceError::not_found(format!("No default {} address", address_type.as_str().to_lowercase())))
    }

    /// Snapshot of the given address, or of the user's default when no id is given.
    pub(crate) async fn resolve(&self, user_id: Uuid, address_id: Option<Uuid>, address_type: AddressType) -> Result<Option<AddressSnapshot>> {
        match address_id {
            Some(id) => Ok(Some(AddressSnapshot::from(&self.owned(user_id, id).await?))),
            None => match self.get_default(user_id, address_type).await {
                Ok(address) => Ok(Some(AddressSnapshot::from(&address))),
                Err(EcommerceError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    async fn owned(&self, user_id: Uuid, address_id: Uuid) -> Result<Address> {
        match self.addresses.find_address(address_id).await? {
            Some(address) if address.user_id == user_id => Ok(address),
            _ => {
                error!(%user_id, %address_id, "address not found");
                Err(EcommerceError::not_found(format!("Address not found: {address_id}")))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::details;
    use super::*;
    use crate::adapters::MemoryStore;
    use speculoos::prelude::*;

    fn service() -> AddressService { AddressService::new(Arc::new(MemoryStore::new())) }

    #[tokio::test]
    async fn test_first_address_becomes_default() {
        let svc = service();
        let user = Uuid::new_v4();
        let first = svc.add(user, details(AddressType::Shipping, "Paris"), false).await.unwrap();
        let second = svc.add(user, details(AddressType::Shipping, "Lyon"), false).await.unwrap();
        assert!(first.is_default);
        assert!(!second.is_default);
        assert_eq!(first.country, "FR");
    }

    #[tokio::test]
    async fn test_single_default_per_type() {
        let svc = service();
        let user = Uuid::new_v4();
        svc.add(user, details(AddressType::Shipping, "Paris"), false).await.unwrap();
        let lyon = svc.add(user, details(AddressType::Shipping, "Lyon"), false).await.unwrap();
        let billing = svc.add(user, details(AddressType::Billing, "Nice"), false).await.unwrap();

        svc.set_default(user, lyon.id).await.unwrap();
        let all = svc.list(user).await.unwrap();
        let defaults: Vec<_> = all.iter().filter(|a| a.is_default).map(|a| a.id).collect();
        assert_eq!(defaults.len(), 2);
        assert!(defaults.contains(&lyon.id) && defaults.contains(&billing.id));
        assert_eq!(svc.get_default(user, AddressType::Shipping).await.unwrap().city, "Lyon");
    }

    #[tokio::test]
    async fn test_other_users_address_is_not_found() {
        let svc = service();
        let owner = Uuid::new_v4();
        let address = svc.add(owner, details(AddressType::Billing, "Paris"), true).await.unwrap();
        let res = svc.delete(Uuid::new_v4(), address.id).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::NotFound(_)));
        let res = svc.resolve(Uuid::new_v4(), Some(address.id), AddressType::Billing).await;
        assert_that!(res).is_err();
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_default() {
        let svc = service();
        let user = Uuid::new_v4();
        assert_that!(svc.resolve(user, None, AddressType::Shipping).await).is_ok().is_none();
        svc.add(user, details(AddressType::Shipping, "Paris"), false).await.unwrap();
        let snapshot = svc.resolve(user, None, AddressType::Shipping).await.unwrap().unwrap();
        assert_eq!(snapshot.city, "Paris");
        assert_that!(svc.get_default(user, AddressType::Billing).await).is_err();
    }
}
