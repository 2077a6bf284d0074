//! Property tests for the cross-cutting invariants a single example can't pin down.

use proptest::prelude::*;
use rubble_gatt::att::{Handle, HandleRange};
use rubble_gatt::connection::{AttConnection, ATT_DEFAULT_MTU};
use rubble_gatt::gatt::database::Database;
use rubble_gatt::gatt::{Characteristic, CharacteristicProperty, Permission, Service};
use rubble_gatt::security::SecurityLevel;
use rubble_gatt::socket::LoopbackSocket;
use rubble_gatt::uuid::Uuid16;

fn service_with_n_characteristics(base_uuid: u16, n: usize) -> Service {
    let mut service = Service::primary(Uuid16(base_uuid));
    for i in 0..n {
        service = service.with_characteristic(Characteristic::new(
            Uuid16(base_uuid.wrapping_add(i as u16 + 1)),
            CharacteristicProperty::READ,
            vec![i as u8],
            Permission::READ_ONLY,
        ));
    }
    service
}

proptest! {
    // Handle density: after any sequence of `append_service`, handles are 1..=count with no gaps.
    #[test]
    fn handle_density_has_no_gaps(char_counts in prop::collection::vec(0usize..6, 1..8)) {
        let mut db = Database::new();
        for (i, n) in char_counts.iter().enumerate() {
            db.append_service(service_with_n_characteristics(0x1000 + i as u16, *n));
        }
        let count = db.attribute_count();
        for raw in 1..=count as u16 {
            prop_assert!(db.attribute(Handle::from_raw(raw)).is_some());
        }
        prop_assert!(db.attribute(Handle::from_raw(count as u16 + 1)).is_none());
    }

    // read_by_group_type over the whole range returns primary services in handle order.
    #[test]
    fn read_by_group_type_is_handle_ordered(char_counts in prop::collection::vec(0usize..4, 1..6)) {
        let mut db = Database::new();
        for (i, n) in char_counts.iter().enumerate() {
            db.append_service(service_with_n_characteristics(0x2000 + i as u16, *n));
        }
        let range = HandleRange::new(Handle::from_raw(1), Handle::from_raw(0xFFFF));
        let found = db.read_by_group_type(&range, true);
        prop_assert_eq!(found.len(), char_counts.len());
        for pair in found.windows(2) {
            prop_assert!(pair[0].0.as_u16() < pair[1].0.as_u16());
        }
    }

    // find_information is a subset of the database and preserves handle order.
    #[test]
    fn find_information_is_ordered_subset(char_counts in prop::collection::vec(0usize..4, 1..5)) {
        let mut db = Database::new();
        for (i, n) in char_counts.iter().enumerate() {
            db.append_service(service_with_n_characteristics(0x3000 + i as u16, *n));
        }
        let count = db.attribute_count();
        let range = HandleRange::new(Handle::from_raw(1), Handle::from_raw(count as u16));
        let attrs = db.find_information(&range);
        prop_assert_eq!(attrs.len(), count);
        for pair in attrs.windows(2) {
            prop_assert!(pair[0].handle.as_u16() < pair[1].handle.as_u16());
        }
    }

    // A write the permission gate accepts is visible to a subsequent find_information.
    #[test]
    fn accepted_write_is_visible_to_find_information(new_value in prop::collection::vec(any::<u8>(), 0..8)) {
        let mut db = Database::new();
        db.append_service(Service::primary(Uuid16(0x180F)).with_characteristic(Characteristic::new(
            Uuid16(0x2A19),
            CharacteristicProperty::READ | CharacteristicProperty::WRITE,
            vec![0],
            Permission::READ_WRITE,
        )));
        let handle = Handle::from_raw(3);
        db.write(handle, &new_value).unwrap();
        let range = HandleRange::new(handle, handle);
        let attrs = db.find_information(&range);
        prop_assert_eq!(&attrs[0].value, &new_value);
    }

    // MTU clamp: after Exchange-MTU with client_mtu = C, connection MTU = max(23, min(C, server_mtu)).
    #[test]
    fn mtu_clamps_to_negotiated_minimum(client_mtu in 0u16..600, server_mtu in 23u16..600) {
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), server_mtu);
        let mut server = rubble_gatt::server::GattServer::new(Database::new(), server_mtu);

        let mut pdu = vec![0x02];
        pdu.extend_from_slice(&client_mtu.to_le_bytes());
        conn.socket_for_test().push_inbound(pdu);
        conn.poll_read(&mut server).unwrap();
        conn.poll_write().unwrap();
        let _ = conn.socket_for_test().pop_outbound();

        let expected = ATT_DEFAULT_MTU.max(client_mtu.min(server_mtu));
        prop_assert_eq!(conn.mtu(), expected);
    }

    // Pairing: every request in a sequence gets exactly one response, in request order.
    #[test]
    fn every_request_gets_exactly_one_response(handles in prop::collection::vec(1u16..10, 1..8)) {
        let mut db = Database::new();
        db.append_service(service_with_n_characteristics(0x4000, 3));
        let mut conn = AttConnection::new(LoopbackSocket::new(SecurityLevel::None), 100);
        let mut server = rubble_gatt::server::GattServer::new(db, 100);

        for h in &handles {
            let mut pdu = vec![0x08]; // Read-By-Type-Req
            pdu.extend_from_slice(&h.to_le_bytes());
            pdu.extend_from_slice(&h.to_le_bytes());
            pdu.extend_from_slice(&0x2803u16.to_le_bytes());
            conn.socket_for_test().push_inbound(pdu);
            conn.poll_read(&mut server).unwrap();
        }
        conn.poll_write().unwrap();

        let mut responses = 0;
        while conn.socket_for_test().pop_outbound().is_some() {
            responses += 1;
        }
        prop_assert_eq!(responses, handles.len());
    }
}
