// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attribute Record and Mask
//!
//! [`EntryAttributes`] is the per-entry attribute record; [`AttrMask`] is
//! the bitset naming which of its fields are meaningful. Together they
//! encode "known vs fetch-needed" without wrapping every field in an
//! `Option`, and they let the catalog compute which columns a read or
//! write touches by mask intersection.
//!
//! ## The Mask Contract
//!
//! - A field is read only if its bit is set: every accessor returns
//!   `Option` and checks the bit.
//! - Every setter stores the value *and* sets the bit.
//! - Merging two records copies exactly the fields masked in the source.
//! - [`AttrMask::READ_ONLY`] names the catalog-managed aggregate counters;
//!   they are stripped from the mask before any catalog write.

use bitflags::bitflags;
use std::fmt::Write as _;

use super::entry::{FileStat, HsmStatus, StripeInfo, StripeItem};

bitflags! {
    /// Bitset naming the meaningful fields of an [`EntryAttributes`] record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttrMask: u32 {
        const FULLPATH      = 1 << 0;
        const NAME          = 1 << 1;
        const OWNER         = 1 << 2;
        const GROUP         = 1 << 3;
        const SIZE          = 1 << 4;
        const BLOCKS        = 1 << 5;
        const LAST_ACCESS   = 1 << 6;
        const LAST_MOD      = 1 << 7;
        const CREATION_TIME = 1 << 8;
        /// Timestamp of the last metadata refresh from the filesystem.
        const MD_UPDATE     = 1 << 9;
        /// Timestamp of the last path refresh from the filesystem.
        const PATH_UPDATE   = 1 << 10;
        const STATUS        = 1 << 11;
        const NO_RELEASE    = 1 << 12;
        const NO_ARCHIVE    = 1 << 13;
        const LAST_ARCHIVE  = 1 << 14;
        const LAST_RESTORE  = 1 << 15;
        const STRIPE_INFO   = 1 << 16;
        const STRIPE_ITEMS  = 1 << 17;
        const RELEASE_CLASS = 1 << 18;
        const ARCHIVE_CLASS = 1 << 19;
        const REL_CL_UPDATE = 1 << 20;
        const ARCH_CL_UPDATE = 1 << 21;
        /// Index of the last journal record applied to this entry.
        const LAST_OP_INDEX = 1 << 22;
        const ARCHIVE_COUNT = 1 << 23;
        const RESTORE_COUNT = 1 << 24;
    }
}

impl AttrMask {
    /// Catalog-managed aggregate counters. Masked off before any write.
    pub const READ_ONLY: AttrMask = AttrMask::ARCHIVE_COUNT.union(AttrMask::RESTORE_COUNT);
}

/// Generates the masked accessor pair for a `Copy` field.
macro_rules! copy_attr {
    ($(#[$doc:meta])* $field:ident: $ty:ty, $bit:ident, $setter:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<$ty> {
            self.mask.contains(AttrMask::$bit).then(|| self.$field)
        }

        pub fn $setter(&mut self, value: $ty) {
            self.$field = value;
            self.mask.insert(AttrMask::$bit);
        }
    };
}

/// Generates the masked accessor pair for a string field.
macro_rules! str_attr {
    ($(#[$doc:meta])* $field:ident: $bit:ident, $setter:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<&str> {
            self.mask
                .contains(AttrMask::$bit)
                .then(|| self.$field.as_str())
        }

        pub fn $setter(&mut self, value: impl Into<String>) {
            self.$field = value.into();
            self.mask.insert(AttrMask::$bit);
        }
    };
}

/// Per-entry attribute record keyed by field tag.
///
/// All timestamps are seconds since the epoch. Fields are only meaningful
/// when their [`AttrMask`] bit is set; the accessors enforce this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryAttributes {
    mask: AttrMask,
    fullpath: String,
    name: String,
    owner: String,
    group: String,
    size: u64,
    blocks: u64,
    last_access: i64,
    last_mod: i64,
    creation_time: i64,
    md_update: i64,
    path_update: i64,
    status: HsmStatus,
    no_release: bool,
    no_archive: bool,
    last_archive: i64,
    last_restore: i64,
    stripe_info: StripeInfo,
    stripe_items: Vec<StripeItem>,
    release_class: String,
    archive_class: String,
    rel_cl_update: i64,
    arch_cl_update: i64,
    last_op_index: u64,
    archive_count: u32,
    restore_count: u32,
}

impl EntryAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set of meaningful fields.
    pub fn mask(&self) -> AttrMask {
        self.mask
    }

    pub fn has(&self, bits: AttrMask) -> bool {
        self.mask.contains(bits)
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Marks the given fields as no longer meaningful. Values stay in
    /// place but become unreadable through the accessors.
    pub fn clear(&mut self, bits: AttrMask) {
        self.mask.remove(bits);
    }

    pub fn clear_all(&mut self) {
        self.mask = AttrMask::empty();
    }

    /// Masks off the catalog-managed fields before a write.
    pub fn strip_read_only(&mut self) {
        self.mask.remove(AttrMask::READ_ONLY);
    }

    str_attr!(fullpath: FULLPATH, set_fullpath);
    str_attr!(name: NAME, set_name);
    str_attr!(owner: OWNER, set_owner);
    str_attr!(group: GROUP, set_group);
    str_attr!(release_class: RELEASE_CLASS, set_release_class);
    str_attr!(archive_class: ARCHIVE_CLASS, set_archive_class);

    copy_attr!(size: u64, SIZE, set_size);
    copy_attr!(blocks: u64, BLOCKS, set_blocks);
    copy_attr!(last_access: i64, LAST_ACCESS, set_last_access);
    copy_attr!(last_mod: i64, LAST_MOD, set_last_mod);
    copy_attr!(creation_time: i64, CREATION_TIME, set_creation_time);
    copy_attr!(md_update: i64, MD_UPDATE, set_md_update);
    copy_attr!(path_update: i64, PATH_UPDATE, set_path_update);
    copy_attr!(status: HsmStatus, STATUS, set_status);
    copy_attr!(no_release: bool, NO_RELEASE, set_no_release);
    copy_attr!(no_archive: bool, NO_ARCHIVE, set_no_archive);
    copy_attr!(last_archive: i64, LAST_ARCHIVE, set_last_archive);
    copy_attr!(last_restore: i64, LAST_RESTORE, set_last_restore);
    copy_attr!(rel_cl_update: i64, REL_CL_UPDATE, set_rel_cl_update);
    copy_attr!(arch_cl_update: i64, ARCH_CL_UPDATE, set_arch_cl_update);
    copy_attr!(last_op_index: u64, LAST_OP_INDEX, set_last_op_index);
    copy_attr!(archive_count: u32, ARCHIVE_COUNT, set_archive_count);
    copy_attr!(restore_count: u32, RESTORE_COUNT, set_restore_count);

    pub fn stripe_info(&self) -> Option<&StripeInfo> {
        self.mask
            .contains(AttrMask::STRIPE_INFO)
            .then_some(&self.stripe_info)
    }

    pub fn set_stripe_info(&mut self, info: StripeInfo) {
        self.stripe_info = info;
        self.mask.insert(AttrMask::STRIPE_INFO);
    }

    pub fn stripe_items(&self) -> Option<&[StripeItem]> {
        self.mask
            .contains(AttrMask::STRIPE_ITEMS)
            .then_some(self.stripe_items.as_slice())
    }

    pub fn set_stripe_items(&mut self, items: Vec<StripeItem>) {
        self.stripe_items = items;
        self.mask.insert(AttrMask::STRIPE_ITEMS);
    }

    /// Returns a copy restricted to the fields in `select`: what a
    /// masked catalog read hands back.
    pub fn filtered(&self, select: AttrMask) -> EntryAttributes {
        let mut out = self.clone();
        out.clear(self.mask & !select);
        out
    }

    /// Copies every field masked in `other` into `self`, setting the
    /// corresponding bits. Fields absent from `other` are untouched.
    pub fn merge_from(&mut self, other: &EntryAttributes) {
        macro_rules! merge_field {
            ($($field:ident => $bit:ident),+ $(,)?) => {
                $(
                    if other.mask.contains(AttrMask::$bit) {
                        self.$field = other.$field.clone();
                        self.mask.insert(AttrMask::$bit);
                    }
                )+
            };
        }

        merge_field!(
            fullpath => FULLPATH,
            name => NAME,
            owner => OWNER,
            group => GROUP,
            size => SIZE,
            blocks => BLOCKS,
            last_access => LAST_ACCESS,
            last_mod => LAST_MOD,
            creation_time => CREATION_TIME,
            md_update => MD_UPDATE,
            path_update => PATH_UPDATE,
            status => STATUS,
            no_release => NO_RELEASE,
            no_archive => NO_ARCHIVE,
            last_archive => LAST_ARCHIVE,
            last_restore => LAST_RESTORE,
            stripe_info => STRIPE_INFO,
            stripe_items => STRIPE_ITEMS,
            release_class => RELEASE_CLASS,
            archive_class => ARCHIVE_CLASS,
            rel_cl_update => REL_CL_UPDATE,
            arch_cl_update => ARCH_CL_UPDATE,
            last_op_index => LAST_OP_INDEX,
            archive_count => ARCHIVE_COUNT,
            restore_count => RESTORE_COUNT,
        );
    }

    /// Populates metadata fields from a stat probe result.
    pub fn apply_stat(&mut self, stat: &FileStat) {
        self.set_owner(stat.owner.clone());
        self.set_group(stat.group.clone());
        self.set_size(stat.size);
        self.set_blocks(stat.blocks);
        self.set_last_access(stat.last_access);
        self.set_last_mod(stat.last_mod);
    }

    /// Synthesizes derivable fields requested in `want` from fields
    /// already present: currently `name` from the basename of `fullpath`.
    pub fn generate_fields(&mut self, want: AttrMask) {
        if want.contains(AttrMask::NAME)
            && !self.mask.contains(AttrMask::NAME)
            && self.mask.contains(AttrMask::FULLPATH)
        {
            if let Some(base) = self.fullpath.rsplit('/').next() {
                if !base.is_empty() {
                    self.set_name(base.to_string());
                }
            }
        }
    }

    /// Renders the fields selected by `select` (and present in the mask)
    /// as a `key=value` list, for alert bodies and debug logs.
    pub fn dump(&self, select: AttrMask) -> String {
        let mut out = String::new();
        let visible = self.mask & select;

        macro_rules! dump_field {
            ($($bit:ident => $label:literal, $value:expr);+ $(;)?) => {
                $(
                    if visible.contains(AttrMask::$bit) {
                        if !out.is_empty() {
                            out.push_str(", ");
                        }
                        let _ = write!(out, concat!($label, "={}"), $value);
                    }
                )+
            };
        }

        dump_field!(
            FULLPATH => "fullpath", self.fullpath;
            NAME => "name", self.name;
            OWNER => "owner", self.owner;
            GROUP => "group", self.group;
            SIZE => "size", self.size;
            BLOCKS => "blocks", self.blocks;
            LAST_ACCESS => "last_access", self.last_access;
            LAST_MOD => "last_mod", self.last_mod;
            CREATION_TIME => "creation_time", self.creation_time;
            MD_UPDATE => "md_update", self.md_update;
            PATH_UPDATE => "path_update", self.path_update;
            STATUS => "status", self.status;
            NO_RELEASE => "no_release", self.no_release;
            NO_ARCHIVE => "no_archive", self.no_archive;
            LAST_ARCHIVE => "last_archive", self.last_archive;
            LAST_RESTORE => "last_restore", self.last_restore;
            RELEASE_CLASS => "release_class", self.release_class;
            ARCHIVE_CLASS => "archive_class", self.archive_class;
            LAST_OP_INDEX => "last_op_index", self.last_op_index;
            ARCHIVE_COUNT => "archive_count", self.archive_count;
            RESTORE_COUNT => "restore_count", self.restore_count;
        );

        out
    }
}
