// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lambda Extensions API client and the lifecycle loop built on it.

pub mod client;
pub mod lifecycle;
