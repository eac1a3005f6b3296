use crate::core::domain::{
    model::{resource::NetworkInterfaceState, server::Interface},
    value_object::{InterfaceType, IpAddressFamily, TriState},
};

/// Maps remote interfaces to their declarative form, in remote list order.
///
/// Tri-state flags the remote leaves empty stay `Unset` and are not
/// serialized.
pub fn translate_interfaces(interfaces: &[Interface]) -> Vec<NetworkInterfaceState> {
    interfaces.iter().map(translate_interface).collect()
}

fn translate_interface(interface: &Interface) -> NetworkInterfaceState {
    let ip = interface.primary_ip();
    NetworkInterfaceState {
        ip_address_family: ip.map(|ip| ip.family),
        ip_address: ip.map(|ip| ip.address.clone()),
        ip_address_floating: ip.map_or(TriState::Unset, |ip| ip.floating),
        mac_address: interface.mac.clone(),
        network: interface.network.clone(),
        interface_type: interface.interface_type,
        source_ip_filtering: interface.source_ip_filtering,
        bootable: interface.bootable,
    }
}

/// Address of the first public IPv4 interface, the SSH endpoint.
pub fn primary_address(interfaces: &[Interface]) -> Option<&str> {
    interfaces
        .iter()
        .filter(|interface| interface.interface_type == InterfaceType::Public)
        .filter_map(Interface::primary_ip)
        .find(|ip| ip.family == IpAddressFamily::IPv4)
        .map(|ip| ip.address.as_str())
}
