// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire round-trip properties for the control protocol.

use super::*;
use proptest::prelude::*;

fn arb_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        Just(Request::Ping),
        Just(Request::Status),
        Just(Request::SnapshotsList),
        Just(Request::SelfTest),
        any::<bool>().prop_map(|all| Request::ListChanges {
            filter: if all { ChangeFilter::All } else { ChangeFilter::Active }
        }),
        "[a-z]{1,12}_[0-9]{1,4}".prop_map(|change_id| Request::Confirm { change_id }),
        "[a-z]{1,12}_[0-9]{1,4}".prop_map(|change_id| Request::Cancel { change_id }),
        proptest::option::of("[ -~]{0,40}")
            .prop_map(|description| Request::SnapshotsCreate { description }),
        "[0-9]{13}-[A-Za-z0-9_-]{6}".prop_map(|snapshot_id| Request::SnapshotsRestore {
            snapshot_id
        }),
    ]
}

proptest! {
    #[test]
    fn request_json_round_trips(request in arb_request()) {
        let json = serde_json::to_vec(&request).unwrap();
        let back: Request = serde_json::from_slice(&json).unwrap();
        prop_assert_eq!(back, request);
    }

    #[test]
    fn frame_round_trips(request in arb_request()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let (mut a, mut b) = tokio::io::duplex(64 * 1024);
            write_message(&mut a, &request).await.unwrap();
            let got: Request = read_message(&mut b).await.unwrap();
            assert_eq!(got, request);
        });
    }
}

#[test]
fn requests_use_op_args_shape() {
    let json = serde_json::to_value(Request::Confirm { change_id: "ssh_1".into() }).unwrap();
    assert_eq!(json["op"], "confirm");
    assert_eq!(json["args"]["change_id"], "ssh_1");

    let json = serde_json::to_value(Request::Ping).unwrap();
    assert_eq!(json["op"], "ping");
}

#[test]
fn responses_use_ok_value_error_shape() {
    let json = serde_json::to_value(Response::ok(Payload::Pong)).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["value"]["type"], "pong");
    assert!(json.get("error").is_none());

    let json = serde_json::to_value(Response::error(ErrorKind::NotConfirmable, "x")).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["kind"], "not-confirmable");
    assert!(json.get("value").is_none());
}
