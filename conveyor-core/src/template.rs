//! Role stack template
//!
//! Renders the CloudFormation template deployed into each downstream account
//! for a role kind. The template takes `ToolsAccountId`, `Stage` and an
//! optional `KeyArn`. The decrypt grant on the artifact key only exists once
//! `KeyArn` is non-empty, which is what lets the same stack be deployed before
//! the key exists and updated after.

use serde_json::{Value, json};

use crate::role::{KEY_ARN_PARAM, RoleKind, STAGE_PARAM, TOOLS_ACCOUNT_PARAM};

/// Condition that is true once a key ARN has been supplied
pub const HAS_KEY_CONDITION: &str = "HasKeyArn";

/// File name of the rendered template for a role kind
pub fn template_file_name(kind: RoleKind) -> String {
    format!("{}.json", kind.slug())
}

/// Renders the role stack template for a role kind
pub fn role_stack_template(kind: RoleKind) -> Value {
    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": format!("{} assumed from the tools account pipeline", kind.role_name()),
        "Parameters": {
            TOOLS_ACCOUNT_PARAM: {
                "Type": "String",
                "Description": "Account hosting the pipeline"
            },
            STAGE_PARAM: {
                "Type": "String",
                "AllowedValues": ["Uat", "Prod"]
            },
            KEY_ARN_PARAM: {
                "Type": "String",
                "Default": "",
                "Description": "Artifact channel key; empty until the channel exists"
            }
        },
        "Conditions": {
            HAS_KEY_CONDITION: {
                "Fn::Not": [{ "Fn::Equals": [{ "Ref": KEY_ARN_PARAM }, ""] }]
            }
        },
        "Resources": {
            "Role": {
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "RoleName": kind.role_name(),
                    "AssumeRolePolicyDocument": trust_policy(kind),
                    "Policies": [
                        base_policy(kind),
                        {
                            "Fn::If": [
                                HAS_KEY_CONDITION,
                                key_policy(),
                                { "Ref": "AWS::NoValue" }
                            ]
                        }
                    ]
                }
            }
        },
        "Outputs": {
            "RoleArn": {
                "Value": { "Fn::GetAtt": ["Role", "Arn"] }
            }
        }
    })
}

fn trust_policy(kind: RoleKind) -> Value {
    let principal = match kind {
        RoleKind::DeploymentRole => json!({ "Service": "cloudformation.amazonaws.com" }),
        RoleKind::CrossAccountRole => json!({
            "AWS": { "Fn::Sub": format!("arn:aws:iam::${{{}}}:root", TOOLS_ACCOUNT_PARAM) }
        }),
    };

    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": principal,
            "Action": "sts:AssumeRole"
        }]
    })
}

fn base_policy(kind: RoleKind) -> Value {
    let actions = match kind {
        RoleKind::DeploymentRole => json!([
            "cloudformation:*",
            "lambda:*",
            "apigateway:*",
            "codedeploy:*",
            "iam:GetRole",
            "iam:CreateRole",
            "iam:DeleteRole",
            "iam:PutRolePolicy",
            "iam:DeleteRolePolicy",
            "iam:AttachRolePolicy",
            "iam:DetachRolePolicy",
            "iam:PassRole",
            "s3:GetObject*"
        ]),
        RoleKind::CrossAccountRole => json!([
            "cloudformation:*",
            "s3:GetObject*",
            "s3:PutObject*",
            "s3:ListBucket",
            "iam:PassRole"
        ]),
    };

    json!({
        "PolicyName": { "Fn::Sub": format!("${{{}}}-{}", STAGE_PARAM, kind.slug()) },
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": actions,
                "Resource": "*"
            }]
        }
    })
}

fn key_policy() -> Value {
    json!({
        "PolicyName": "artifact-key",
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": [
                    "kms:Decrypt",
                    "kms:DescribeKey",
                    "kms:Encrypt",
                    "kms:ReEncrypt*",
                    "kms:GenerateDataKey*"
                ],
                "Resource": { "Ref": KEY_ARN_PARAM }
            }]
        }
    })
}
