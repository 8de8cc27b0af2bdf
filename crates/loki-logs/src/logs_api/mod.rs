// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lambda Logs API: subscribing, and receiving the deliveries it pushes.

pub mod receiver;
pub mod subscription;
