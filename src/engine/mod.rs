// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod agreements;
pub mod calc;
pub mod credits;
pub mod error;
pub mod money;
pub mod precedence;
pub mod snapshot;
pub mod tiers;
pub mod vat;
