//! Private address selection

use dockbridge_proto::ComputeInstance;

use crate::error::RemoteError;

/// Return the first private overlay address of `instance`, in the order the
/// control plane reported them.
///
/// There is deliberately no fallback to a public address: the Docker socket
/// must only be reachable over the private network.
pub fn select_private_address(instance: &ComputeInstance) -> Result<&str, RemoteError> {
    instance
        .addresses
        .iter()
        .find(|addr| addr.kind.is_private_net())
        .map(|addr| addr.address.as_str())
        .ok_or_else(|| RemoteError::NoPrivateAddress {
            instance_id: instance.id.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockbridge_proto::NetworkAddress;

    fn instance(addresses: Vec<NetworkAddress>) -> ComputeInstance {
        ComputeInstance {
            id: "mach_1".to_string(),
            addresses,
            app_id: "app_1".to_string(),
        }
    }

    #[test]
    fn test_private_after_public() {
        let instance = instance(vec![
            NetworkAddress::public("1.2.3.4"),
            NetworkAddress::private_net("10.0.0.5"),
        ]);
        assert_eq!(select_private_address(&instance).unwrap(), "10.0.0.5");
    }

    #[test]
    fn test_first_private_wins() {
        let instance = instance(vec![
            NetworkAddress::new("v6", "2001:db8::1"),
            NetworkAddress::public("1.2.3.4"),
            NetworkAddress::private_net("fdaa:0:1::5"),
            NetworkAddress::public("5.6.7.8"),
            NetworkAddress::private_net("fdaa:0:1::6"),
        ]);
        assert_eq!(select_private_address(&instance).unwrap(), "fdaa:0:1::5");
    }

    #[test]
    fn test_no_private_address() {
        for addresses in [
            vec![],
            vec![NetworkAddress::public("1.2.3.4")],
            vec![
                NetworkAddress::public("1.2.3.4"),
                NetworkAddress::new("Privatenet", "10.0.0.9"),
            ],
        ] {
            let err = select_private_address(&instance(addresses)).unwrap_err();
            assert!(
                matches!(err, RemoteError::NoPrivateAddress { ref instance_id } if instance_id == "mach_1")
            );
        }
    }
}
