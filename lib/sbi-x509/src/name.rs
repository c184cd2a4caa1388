// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Distinguished names, reduced to the six attributes the boot chain
//! compares.

use heapless::Vec;

use crate::der::{tag, Reader};
use crate::X509Error;

/// Longest attribute value we keep.
pub const MAX_ATTR_LEN: usize = 64;

const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_COUNTRY: &[u8] = &[0x55, 0x04, 0x06];
const OID_LOCALITY: &[u8] = &[0x55, 0x04, 0x07];
const OID_STATE: &[u8] = &[0x55, 0x04, 0x08];
const OID_ORGANIZATION: &[u8] = &[0x55, 0x04, 0x0A];
const OID_ORG_UNIT: &[u8] = &[0x55, 0x04, 0x0B];

/// Attribute slots, in the order they are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DnAttr {
    CommonName,
    Country,
    Locality,
    State,
    Organization,
    OrgUnit,
}

const NUM_ATTRS: usize = 6;

impl DnAttr {
    fn from_oid(oid: &[u8]) -> Option<Self> {
        match oid {
            _ if oid == OID_COMMON_NAME => Some(Self::CommonName),
            _ if oid == OID_COUNTRY => Some(Self::Country),
            _ if oid == OID_LOCALITY => Some(Self::Locality),
            _ if oid == OID_STATE => Some(Self::State),
            _ if oid == OID_ORGANIZATION => Some(Self::Organization),
            _ if oid == OID_ORG_UNIT => Some(Self::OrgUnit),
            _ => None,
        }
    }
}

/// A parsed Name: one optional value per recognized attribute type.
/// Attributes with unrecognized types are skipped. Equality is a deep
/// compare of all six slots.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DistinguishedName {
    attrs: [Option<Vec<u8, MAX_ATTR_LEN>>; NUM_ATTRS],
}

impl DistinguishedName {
    /// Parses a `Name` (SEQUENCE of RDN SETs) at the reader's position.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, X509Error> {
        let mut dn = Self::default();
        let name_len = r.enter(tag::SEQUENCE)?;
        let name_end = r.pos() + name_len;

        while r.pos() < name_end {
            let set_len = r.enter(tag::SET)?;
            let set_end = r.pos() + set_len;
            while r.pos() < set_end {
                let atv_len = r.enter(tag::SEQUENCE)?;
                let atv_end = r.pos() + atv_len;
                let oid = r.read(tag::OID)?;
                match DnAttr::from_oid(oid) {
                    Some(kind) => {
                        let value = r.read_any_string()?;
                        let mut stored = Vec::new();
                        stored
                            .extend_from_slice(value)
                            .map_err(|_| X509Error::Capacity)?;
                        dn.attrs[kind as usize] = Some(stored);
                    }
                    None => r.skip_any()?,
                }
                if r.pos() != atv_end {
                    return Err(X509Error::BadDer);
                }
            }
        }
        if r.pos() != name_end {
            return Err(X509Error::BadDer);
        }
        Ok(dn)
    }

    pub fn get(&self, kind: DnAttr) -> Option<&[u8]> {
        self.attrs[kind as usize].as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.iter().all(|a| a.is_none())
    }
}
