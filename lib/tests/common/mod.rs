#![allow(dead_code)]

use once_cell::sync::Lazy;
use ref_updater::{AtomicSlot, Caller, Class, TypeInfo, Updater, Visibility};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_log() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Immutable counter value, replaced as a whole on every increment.
#[derive(Debug, PartialEq, Eq)]
pub struct Count(pub u64);

pub struct Counter {
    pub value: AtomicSlot<Count>,
}

impl Counter {
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicSlot::from(Arc::new(Count(value))),
        }
    }

    pub fn updater() -> Updater<Counter, Count> {
        Updater::new("value", &Caller::module(module_path!())).unwrap()
    }
}

impl Class for Counter {
    fn class() -> &'static TypeInfo {
        static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
            TypeInfo::builder::<Counter>()
                .slot("value", Visibility::Public, |counter| &counter.value)
                .build()
        });

        &CLASS
    }
}

pub struct Node {
    pub id: u64,
    pub left: AtomicSlot<Node>,
}

impl Node {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            left: AtomicSlot::empty(),
        })
    }

    pub fn updater() -> Updater<Node, Node> {
        Updater::new("left", &Caller::module(module_path!())).unwrap()
    }
}

impl Class for Node {
    fn class() -> &'static TypeInfo {
        static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
            TypeInfo::builder::<Node>()
                .slot("left", Visibility::Public, |node| &node.left)
                .build()
        });

        &CLASS
    }
}
