// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hardware usage and project quotas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware a topology (or a set of stacks) consumes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HardwareUsage {
    pub vcpu: f64,
    /// RAM in GiB
    pub ram: f64,
    pub instances: f64,
    pub network: f64,
    pub subnet: f64,
    pub port: f64,
}

/// Absolute project limits, in the same dimensions as [`HardwareUsage`]
pub type ProjectLimits = HardwareUsage;

impl HardwareUsage {
    /// Usage of `count` identical stacks
    pub fn scaled(&self, count: u32) -> Self {
        let factor = f64::from(count);
        Self {
            vcpu: self.vcpu * factor,
            ram: self.ram * factor,
            instances: self.instances * factor,
            network: self.network * factor,
            subnet: self.subnet * factor,
            port: self.port * factor,
        }
    }

    fn entries(&self) -> [(QuotaResource, f64); 6] {
        [
            (QuotaResource::Vcpu, self.vcpu),
            (QuotaResource::Ram, self.ram),
            (QuotaResource::Instances, self.instances),
            (QuotaResource::Network, self.network),
            (QuotaResource::Subnet, self.subnet),
            (QuotaResource::Port, self.port),
        ]
    }
}

/// Quota dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaResource {
    Vcpu,
    Ram,
    Instances,
    Network,
    Subnet,
    Port,
}

impl fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotaResource::Vcpu => "vcpu",
            QuotaResource::Ram => "ram",
            QuotaResource::Instances => "instances",
            QuotaResource::Network => "network",
            QuotaResource::Subnet => "subnet",
            QuotaResource::Port => "port",
        };
        write!(f, "{}", name)
    }
}

/// A single quota; a negative limit means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub limit: f64,
    pub in_use: f64,
}

impl Quota {
    pub fn new(limit: f64, in_use: f64) -> Self {
        Self { limit, in_use }
    }

    pub fn unlimited(in_use: f64) -> Self {
        Self { limit: -1.0, in_use }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit < 0.0
    }

    /// Remaining headroom, `None` when unlimited
    pub fn available(&self) -> Option<f64> {
        if self.is_unlimited() {
            None
        } else {
            Some(self.limit - self.in_use)
        }
    }
}

/// Quotas of a cloud project
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaSet {
    pub vcpu: Quota,
    pub ram: Quota,
    pub instances: Quota,
    pub network: Quota,
    pub subnet: Quota,
    pub port: Quota,
}

/// A quota dimension that cannot accommodate the requested usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaViolation {
    pub resource: QuotaResource,
    pub required: f64,
    pub available: f64,
}

impl QuotaSet {
    pub fn get(&self, resource: QuotaResource) -> &Quota {
        match resource {
            QuotaResource::Vcpu => &self.vcpu,
            QuotaResource::Ram => &self.ram,
            QuotaResource::Instances => &self.instances,
            QuotaResource::Network => &self.network,
            QuotaResource::Subnet => &self.subnet,
            QuotaResource::Port => &self.port,
        }
    }

    /// First dimension in which `required` does not fit
    pub fn check(&self, required: &HardwareUsage) -> Result<(), QuotaViolation> {
        for (resource, amount) in required.entries() {
            if let Some(available) = self.get(resource).available() {
                if amount > available {
                    return Err(QuotaViolation {
                        resource,
                        required: amount,
                        available,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Kind of key pair registered in the cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPairType {
    #[default]
    Ssh,
    X509,
}

/// Cloud key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub name: String,
    pub public_key: String,

    /// Only returned when the cloud generated the key pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(default)]
    pub key_type: KeyPairType,
}
