// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod agreements;
pub mod calculate;
pub mod contributions;
pub mod credits;
pub mod doctor;
pub mod exporter;
pub mod importer;
pub mod rules;
pub mod tracks;
pub mod vat;
