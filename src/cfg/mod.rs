// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod cli;
pub mod logger;
pub mod sdk_config;
